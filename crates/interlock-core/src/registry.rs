//! Stage registry and transition engine.
//!
//! Everything here is static data keyed by `Stage`: the role text handed to
//! the agent, the payload fields each working stage requires, and the
//! successor map. The chain is strictly linear:
//!
//!   fetch_ticket → extract_requirements → scope_context → gather_evidence
//!     → propose_plan → act_via_tools → record_and_finalize → complete
//!
//! No branches, no cycles, no skips. Terminals have no successor.

use interlock_contracts::stage::Stage;

pub const AGENT_ROLE_COMPLETE: &str = "Run is complete. No further action is required.";
pub const AGENT_ROLE_FAIL_CLOSED: &str =
    "Run is fail-closed. Resolve invalidation report before retrying.";
pub const AGENT_ROLE_INVALID_STATE: &str = "Invalid ticket state. Fix state and resubmit.";
pub const AGENT_ROLE_BAD_INPUT: &str = "Invalid input payload. Send valid ticket JSON.";

/// Static contract for one working stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub stage: Stage,
    pub agent_role: &'static str,
    pub required_fields: &'static [&'static str],
}

/// One entry per working stage, in chain order.
pub const STAGE_SPECS: [StageSpec; 7] = [
    StageSpec {
        stage: Stage::FetchTicket,
        agent_role: "Fetch ticket context from source systems (Atlassian/Notion/Linear) and fill \
                     only the required ticket fields. Do not extract requirements or propose a plan yet.",
        required_fields: &["external_source", "external_ticket_id", "title", "description"],
    },
    StageSpec {
        stage: Stage::ExtractRequirements,
        agent_role: "Extract acceptance criteria, constraints, and unknowns from the fetched ticket \
                     context. Do not retrieve additional evidence or plan execution in this stage.",
        required_fields: &["acceptance_criteria", "constraints", "unknowns"],
    },
    StageSpec {
        stage: Stage::ScopeContext,
        agent_role: "Define explicit context retrieval targets and justifications based on the \
                     extracted requirements.",
        required_fields: &["retrieval_targets", "retrieval_justification"],
    },
    StageSpec {
        stage: Stage::GatherEvidence,
        agent_role: "Collect minimal evidence snippets with provenance and locators. Do not propose \
                     a plan yet.",
        required_fields: &["evidence_items"],
    },
    StageSpec {
        stage: Stage::ProposePlan,
        agent_role: "Produce a structured plan where each step maps to requirements and cites evidence.",
        required_fields: &["plan_steps"],
    },
    StageSpec {
        stage: Stage::ActViaTools,
        agent_role: "Execute plan steps via tools, record actions, outputs, and checkpoints.",
        required_fields: &["actions_taken", "outputs", "checkpoints"],
    },
    StageSpec {
        stage: Stage::RecordAndFinalize,
        agent_role: "Persist canonical artifacts, produce final summary, and report final outcome.",
        required_fields: &["artifacts", "final_summary", "outcome"],
    },
];

/// Look up the spec for a working stage. `None` for terminals.
pub fn stage_spec(stage: Stage) -> Option<&'static StageSpec> {
    STAGE_SPECS.iter().find(|spec| spec.stage == stage)
}

/// The fixed successor of `stage`, or `None` for terminals.
pub fn successor(stage: Stage) -> Option<Stage> {
    match stage {
        Stage::FetchTicket => Some(Stage::ExtractRequirements),
        Stage::ExtractRequirements => Some(Stage::ScopeContext),
        Stage::ScopeContext => Some(Stage::GatherEvidence),
        Stage::GatherEvidence => Some(Stage::ProposePlan),
        Stage::ProposePlan => Some(Stage::ActViaTools),
        Stage::ActViaTools => Some(Stage::RecordAndFinalize),
        Stage::RecordAndFinalize => Some(Stage::Complete),
        Stage::Complete | Stage::FailClosed => None,
    }
}

pub fn role_of(stage: Stage) -> &'static str {
    match stage {
        Stage::Complete => AGENT_ROLE_COMPLETE,
        Stage::FailClosed => AGENT_ROLE_FAIL_CLOSED,
        _ => stage_spec(stage).map_or(AGENT_ROLE_INVALID_STATE, |spec| spec.agent_role),
    }
}

/// Payload fields required at `stage`; empty for terminals.
pub fn required_fields_of(stage: Stage) -> Vec<String> {
    stage_spec(stage)
        .map(|spec| spec.required_fields.iter().map(|f| f.to_string()).collect())
        .unwrap_or_default()
}

/// Payload fields the successor stage will require; empty if there is none.
pub fn next_required_fields_of(stage: Stage) -> Vec<String> {
    successor(stage).map(required_fields_of).unwrap_or_default()
}

pub fn is_terminal(stage: Stage) -> bool {
    stage.is_terminal()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    Pass,
    Stop,
}

/// Outcome of asking the engine to advance one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub status: TransitionStatus,
    pub reason: String,
    /// Set only when `status` is `Pass`.
    pub next_stage: Option<Stage>,
    /// Role for the resulting stage (or for the stop condition).
    pub role: &'static str,
}

impl TransitionResult {
    fn stop(reason: String, role: &'static str) -> Self {
        Self {
            status: TransitionStatus::Stop,
            reason,
            next_stage: None,
            role,
        }
    }
}

/// Advance one step along the chain.
///
/// Terminals yield `Stop` naming the terminal condition.
pub fn advance(stage: Stage) -> TransitionResult {
    match (stage, successor(stage)) {
        (Stage::Complete, _) => {
            TransitionResult::stop("Run already completed".to_string(), AGENT_ROLE_COMPLETE)
        }
        (Stage::FailClosed, _) => {
            TransitionResult::stop("Run is fail-closed".to_string(), AGENT_ROLE_FAIL_CLOSED)
        }
        (_, None) => TransitionResult::stop(format!("Invalid state: {stage}"), AGENT_ROLE_INVALID_STATE),
        (_, Some(next)) => TransitionResult {
            status: TransitionStatus::Pass,
            reason: format!("Transition {stage} -> {next}"),
            next_stage: Some(next),
            role: role_of(next),
        },
    }
}

/// Advance from a stage given by its wire name.
///
/// The string-level form of `advance` for callers holding a raw state name;
/// submitted envelopes never reach it because parsing rejects unknown names.
/// A name outside the known stage set stops the run, never the process.
pub fn advance_named(name: &str) -> TransitionResult {
    match name.parse::<Stage>() {
        Ok(stage) => advance(stage),
        Err(_) => TransitionResult::stop(format!("Invalid state: {name}"), AGENT_ROLE_INVALID_STATE),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
