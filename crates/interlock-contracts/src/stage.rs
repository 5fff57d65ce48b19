//! Workflow stages.
//!
//! A run walks a fixed linear chain of seven working stages and ends in one
//! of two terminal markers. The wire form of every stage is its snake_case
//! name (e.g. `"fetch_ticket"`), which is what agents see in the envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One step of the ticket workflow, or a terminal marker.
///
/// Variants are declared in chain order, so the derived `Ord` follows the
/// workflow; the two terminals sort after every working stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchTicket,
    ExtractRequirements,
    ScopeContext,
    GatherEvidence,
    ProposePlan,
    ActViaTools,
    RecordAndFinalize,
    /// Terminal: every working stage passed.
    Complete,
    /// Terminal: the run hit a blocking violation. There is no way out.
    FailClosed,
}

impl Stage {
    /// Every stage, working stages first in chain order.
    pub const ALL: [Stage; 9] = [
        Stage::FetchTicket,
        Stage::ExtractRequirements,
        Stage::ScopeContext,
        Stage::GatherEvidence,
        Stage::ProposePlan,
        Stage::ActViaTools,
        Stage::RecordAndFinalize,
        Stage::Complete,
        Stage::FailClosed,
    ];

    /// The seven working stages in chain order.
    pub const WORKING: [Stage; 7] = [
        Stage::FetchTicket,
        Stage::ExtractRequirements,
        Stage::ScopeContext,
        Stage::GatherEvidence,
        Stage::ProposePlan,
        Stage::ActViaTools,
        Stage::RecordAndFinalize,
    ];

    /// The wire name of this stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FetchTicket => "fetch_ticket",
            Stage::ExtractRequirements => "extract_requirements",
            Stage::ScopeContext => "scope_context",
            Stage::GatherEvidence => "gather_evidence",
            Stage::ProposePlan => "propose_plan",
            Stage::ActViaTools => "act_via_tools",
            Stage::RecordAndFinalize => "record_and_finalize",
            Stage::Complete => "complete",
            Stage::FailClosed => "fail_closed",
        }
    }

    /// True for `Complete` and `FailClosed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::FailClosed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        write!(f, "Invalid state: {}. Must be one of [{}]", self.0, known.join(", "))
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
