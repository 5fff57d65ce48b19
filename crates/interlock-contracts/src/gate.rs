//! Gate verdicts and normalized validation issues.
//!
//! A gate never raises: every structural problem it finds becomes a
//! `ValidationIssue` inside a `GateResult`. Issues carry a machine-readable
//! `IssueCode` so callers can branch on the kind of error without parsing
//! messages, and they are always sorted so two runs over the same input
//! produce byte-identical output.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable kind of a validation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// A declared field is absent.
    Missing,
    /// A text field holds something other than a string.
    NotAString,
    /// A text field is empty after trimming.
    EmptyString,
    /// A list field holds something other than an array.
    NotAList,
    /// A list field has no elements.
    EmptyList,
    /// A list element is empty after trimming.
    EmptyListItem,
    /// A nested record (or the payload itself) is not a JSON object.
    NotAnObject,
    /// A field that the closed schema does not declare.
    UnknownField,
    /// A literal field holds a value outside its allowed set.
    InvalidLiteral,
    /// The envelope names a state outside the known stage set.
    InvalidState,
    /// A run id that cannot name a run: a path-like or reserved value.
    InvalidRunId,
    /// The submitted document is not valid JSON.
    JsonDecodeError,
    /// The document is JSON but does not fit the envelope contract.
    EnvelopeSchemaError,
    /// The envelope was produced for a different schema version.
    SchemaVersionMismatch,
    /// The gate returned a blocking verdict.
    BlockingGateFailure,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::Missing => "missing",
            IssueCode::NotAString => "not_a_string",
            IssueCode::EmptyString => "empty_string",
            IssueCode::NotAList => "not_a_list",
            IssueCode::EmptyList => "empty_list",
            IssueCode::EmptyListItem => "empty_list_item",
            IssueCode::NotAnObject => "not_an_object",
            IssueCode::UnknownField => "unknown_field",
            IssueCode::InvalidLiteral => "invalid_literal",
            IssueCode::InvalidState => "invalid_state",
            IssueCode::InvalidRunId => "invalid_run_id",
            IssueCode::JsonDecodeError => "json_decode_error",
            IssueCode::EnvelopeSchemaError => "envelope_schema_error",
            IssueCode::SchemaVersionMismatch => "schema_version_mismatch",
            IssueCode::BlockingGateFailure => "blocking_gate_failure",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural problem, located by a dotted path such as
/// `plan_steps.0.evidence_refs.2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub code: IssueCode,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}

/// Sort issues by `(field, code, message)`.
pub fn sort_issues(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        (a.field.as_str(), a.code.as_str(), a.message.as_str())
            .cmp(&(b.field.as_str(), b.code.as_str(), b.message.as_str()))
    });
}

/// The distinct offending field paths, sorted.
pub fn distinct_fields(issues: &[ValidationIssue]) -> Vec<String> {
    issues
        .iter()
        .map(|issue| issue.field.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tri-state gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// The payload satisfies the stage contract.
    Pass,
    /// The payload has fixable problems; resubmit the same stage.
    Retry,
    /// The run cannot continue.
    Stop,
}

/// What a gate reports back for one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateResult {
    pub status: GateStatus,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub fixes: Option<Vec<String>>,
    #[serde(default)]
    pub missing_or_invalid_fields: Vec<String>,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

impl GateResult {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Pass,
            reasons: vec![reason.into()],
            fixes: None,
            missing_or_invalid_fields: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Stop,
            reasons: vec![reason.into()],
            fixes: None,
            missing_or_invalid_fields: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Build a retry verdict. Issues are sorted and the offending field list
    /// is derived from them, so callers cannot hand in an inconsistent pair.
    pub fn retry(
        reason: impl Into<String>,
        fix: impl Into<String>,
        mut issues: Vec<ValidationIssue>,
    ) -> Self {
        sort_issues(&mut issues);
        let missing_or_invalid_fields = distinct_fields(&issues);
        Self {
            status: GateStatus::Retry,
            reasons: vec![reason.into()],
            fixes: Some(vec![fix.into()]),
            missing_or_invalid_fields,
            issues,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == GateStatus::Pass
    }
}
