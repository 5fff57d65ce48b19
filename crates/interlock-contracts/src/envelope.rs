//! The ticket envelope: the single document exchanged on every round trip.
//!
//! The agent owns only `payload`. Everything else is written by the server
//! and must be echoed back unchanged; derived fields (`agent_role`,
//! `required_fields`, `next_stage_fields`) are recomputed on every response
//! regardless of what the agent sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    gate::{sort_issues, IssueCode, ValidationIssue},
    stage::Stage,
};

/// Envelope schema version this build issues and accepts.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// The agent-supplied stage payload. Opaque to the envelope itself.
pub type Payload = Map<String, Value>;

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

// ── Validation summary ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    #[default]
    Pending,
    Valid,
    InvalidFixable,
    InvalidBlocking,
}

/// Validation summary attached to each envelope the server returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationStatus {
    #[serde(default)]
    pub status: ValidationState,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
}

impl ValidationStatus {
    pub fn valid() -> Self {
        Self {
            status: ValidationState::Valid,
            errors: Vec::new(),
        }
    }
}

/// Written once, when a run enters `FailClosed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidationReport {
    /// The stage the run was in when it failed.
    pub state: Stage,
    pub reason_code: IssueCode,
    /// Always false: a fail-closed run has no fix inside the run.
    pub fixable: bool,
    #[serde(default)]
    pub missing_or_invalid_fields: Vec<String>,
    pub required_next_action: String,
}

// ── History ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryResult {
    Initialized,
    Advanced,
    Retry,
    Blocked,
    Completed,
}

/// One audit record of a transition or validation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub from_state: Option<Stage>,
    pub to_state: Stage,
    pub result: HistoryResult,
    pub reason: String,
}

impl HistoryEntry {
    pub fn now(
        from_state: Option<Stage>,
        to_state: Stage,
        result: HistoryResult,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            from_state,
            to_state,
            result,
            reason: reason.into(),
        }
    }
}

/// Append-only sequence of history entries.
///
/// `append` is the only mutator; entries cannot be edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryEntry>);

impl History {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.0.iter()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// The canonical round-tripped ticket document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketEnvelope {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub run_id: String,
    pub ticket_id: String,
    pub state: Stage,
    pub agent_role: String,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub next_stage_fields: Vec<String>,
    #[serde(default)]
    pub validation: ValidationStatus,
    #[serde(default)]
    pub invalidation_report: Option<InvalidationReport>,
    #[serde(default)]
    pub history: History,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Why a submitted document could not be read as an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("ticket envelope failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),
}

impl EnvelopeError {
    /// Normalized issues describing the failure.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        match self {
            EnvelopeError::Decode(e) => vec![ValidationIssue::new(
                "ticket_json",
                IssueCode::JsonDecodeError,
                e.to_string(),
            )],
            EnvelopeError::Invalid(issues) => issues.clone(),
        }
    }
}

/// Text fields the envelope cannot exist without.
const REQUIRED_TEXT_FIELDS: [&str; 4] = ["run_id", "ticket_id", "state", "agent_role"];

/// Field-name lists whose entries must be non-empty.
const FIELD_NAME_LISTS: [&str; 2] = ["required_fields", "next_stage_fields"];

impl TicketEnvelope {
    /// Serialize for exchange with the agent.
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Parse and structurally validate a submitted document.
    ///
    /// All envelope-level problems are collected before returning. Text
    /// fields and field-name entries are trimmed on the way in.
    pub fn from_json(document: &str) -> Result<Self, EnvelopeError> {
        let mut value: Value = serde_json::from_str(document)?;

        let Some(object) = value.as_object_mut() else {
            return Err(EnvelopeError::Invalid(vec![ValidationIssue::new(
                "ticket_json",
                IssueCode::NotAnObject,
                "ticket_json must be a JSON object",
            )]));
        };

        let mut issues = normalize_envelope_fields(object);
        if !issues.is_empty() {
            sort_issues(&mut issues);
            return Err(EnvelopeError::Invalid(issues));
        }

        serde_json::from_value(value).map_err(|e| {
            EnvelopeError::Invalid(vec![ValidationIssue::new(
                "ticket_json",
                IssueCode::EnvelopeSchemaError,
                e.to_string(),
            )])
        })
    }
}

/// Run id reserved for the log that spans every run.
pub const RESERVED_RUN_ID: &str = "global";

/// Check that a trimmed, non-empty `run_id` can name a run.
///
/// Run ids become directory names and log scopes, so path separators,
/// `.`/`..`, control characters and `RESERVED_RUN_ID` are refused.
pub fn check_run_id(run_id: &str) -> Result<(), String> {
    if run_id == RESERVED_RUN_ID {
        return Err(format!("run_id '{run_id}' is reserved"));
    }
    let path_like = run_id == "."
        || run_id == ".."
        || run_id.contains(['/', '\\'])
        || run_id.chars().any(char::is_control);
    if path_like {
        return Err(format!(
            "run_id '{}' must not contain path separators or control characters",
            run_id.escape_default()
        ));
    }
    Ok(())
}

/// Best-effort run id lookup on a document that failed to parse, so the
/// rejected attempt can still be attributed. Ids that `check_run_id`
/// refuses are not attributed.
pub fn peek_run_id(document: &str) -> Option<String> {
    let value: Value = serde_json::from_str(document).ok()?;
    let run_id = value.get("run_id")?.as_str()?.trim();
    (!run_id.is_empty() && check_run_id(run_id).is_ok()).then(|| run_id.to_string())
}

fn normalize_envelope_fields(object: &mut Map<String, Value>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for name in REQUIRED_TEXT_FIELDS {
        match object.get_mut(name) {
            None => issues.push(ValidationIssue::new(name, IssueCode::Missing, "Field required")),
            Some(value) => check_text(name, value, &mut issues),
        }
    }

    // Already trimmed above; a blank id has its own issue.
    if let Some(Value::String(run_id)) = object.get("run_id") {
        if let Err(reason) = check_run_id(run_id) {
            issues.push(ValidationIssue::new("run_id", IssueCode::InvalidRunId, reason));
        }
    }

    // schema_version is defaulted when absent but may not be blank.
    if let Some(value) = object.get_mut("schema_version") {
        check_text("schema_version", value, &mut issues);
    }

    if let Some(Value::String(state)) = object.get("state") {
        if !state.trim().is_empty() {
            if let Err(unknown) = state.parse::<Stage>() {
                issues.push(ValidationIssue::new(
                    "state",
                    IssueCode::InvalidState,
                    unknown.to_string(),
                ));
            }
        }
    }

    for name in FIELD_NAME_LISTS {
        let Some(value) = object.get_mut(name) else {
            continue;
        };
        let Some(items) = value.as_array_mut() else {
            issues.push(ValidationIssue::new(name, IssueCode::NotAList, "Input should be a valid list"));
            continue;
        };
        for (idx, item) in items.iter_mut().enumerate() {
            let path = format!("{name}.{idx}");
            match item {
                Value::String(s) if s.trim().is_empty() => issues.push(ValidationIssue::new(
                    path,
                    IssueCode::EmptyListItem,
                    "Field names cannot be empty",
                )),
                Value::String(s) => *s = s.trim().to_string(),
                _ => issues.push(ValidationIssue::new(
                    path,
                    IssueCode::NotAString,
                    "Input should be a valid string",
                )),
            }
        }
    }

    if let Some(payload) = object.get("payload") {
        if !payload.is_object() {
            issues.push(ValidationIssue::new(
                "payload",
                IssueCode::NotAnObject,
                "Input should be a valid dictionary",
            ));
        }
    }

    issues
}

fn check_text(name: &str, value: &mut Value, issues: &mut Vec<ValidationIssue>) {
    match value {
        Value::String(s) if s.trim().is_empty() => issues.push(ValidationIssue::new(
            name,
            IssueCode::EmptyString,
            "Field cannot be empty or whitespace only",
        )),
        Value::String(s) => *s = s.trim().to_string(),
        _ => issues.push(ValidationIssue::new(
            name,
            IssueCode::NotAString,
            "Input should be a valid string",
        )),
    }
}
