//! The stage payload gate.
//!
//! `StagePayloadGate` implements the `Gate` trait from `interlock-core`. It
//! looks up the schema for the envelope's current stage and walks it field
//! by field:
//!
//! 1. **Closed set**: any payload key the schema does not declare.
//! 2. **Presence**: every declared field must exist.
//! 3. **Shape**: text is non-empty after trimming; lists are non-empty and
//!    every element is non-empty; nested records recurse; literals must be
//!    one of their allowed tokens.
//!
//! All problems are collected before returning so the agent sees the whole
//! list in one round trip.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use interlock_contracts::{
    envelope::Payload,
    gate::{GateResult, IssueCode, ValidationIssue},
    stage::Stage,
};
use interlock_core::traits::Gate;

use crate::catalog::{FieldKind, FieldSpec, RecordSchema, SchemaCatalog};

/// Corrective hint attached to every retry verdict.
pub const RETRY_FIX: &str =
    "Populate all required fields with non-empty values and resubmit ticket.json";

/// Validates stage payloads against a `SchemaCatalog`.
#[derive(Debug, Clone, Default)]
pub struct StagePayloadGate {
    catalog: SchemaCatalog,
}

impl StagePayloadGate {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }
}

impl Gate for StagePayloadGate {
    fn validate(&self, stage: Stage, payload: &Payload) -> GateResult {
        if stage.is_terminal() {
            return GateResult::stop(format!("State '{stage}' is terminal"));
        }

        let Some(schema) = self.catalog.get(stage) else {
            warn!(stage = %stage, "no payload schema registered");
            return GateResult::stop(format!(
                "No payload schema is registered for state '{stage}'"
            ));
        };

        let mut issues = Vec::new();
        check_record(schema, payload, "", &mut issues);

        debug!(
            stage = %stage,
            schema = schema.name,
            issue_count = issues.len(),
            "payload checked"
        );

        if issues.is_empty() {
            GateResult::pass(format!("Payload schema validation passed for '{stage}'"))
        } else {
            GateResult::retry(
                format!("Payload validation failed for state '{stage}'"),
                RETRY_FIX,
                issues,
            )
        }
    }
}

/// Check `record` against `schema`, pushing every violation onto `issues`.
/// Paths are dotted and prefixed with `prefix` when it is non-empty.
pub fn check_record(
    schema: &RecordSchema,
    record: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    for key in record.keys() {
        if schema.field(key).is_none() {
            issues.push(ValidationIssue::new(
                join(prefix, key),
                IssueCode::UnknownField,
                "Extra inputs are not permitted",
            ));
        }
    }

    for spec in schema.fields {
        let path = join(prefix, spec.name);
        match record.get(spec.name) {
            None => issues.push(ValidationIssue::new(path, IssueCode::Missing, "Field required")),
            Some(value) => check_field(spec, value, &path, issues),
        }
    }
}

fn check_field(spec: &FieldSpec, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    match spec.kind {
        FieldKind::Text => check_text(value, path, IssueCode::EmptyString, issues),

        FieldKind::TextList => {
            if let Some(items) = non_empty_list(value, path, issues) {
                for (idx, item) in items.iter().enumerate() {
                    check_text(item, &join(path, &idx.to_string()), IssueCode::EmptyListItem, issues);
                }
            }
        }

        FieldKind::Literal(allowed) => match value.as_str() {
            None => issues.push(not_a_string(path)),
            Some(s) if allowed.contains(&s.trim()) => {}
            Some(_) => issues.push(ValidationIssue::new(
                path,
                IssueCode::InvalidLiteral,
                format!("Input should be {}", quoted_choices(allowed)),
            )),
        },

        FieldKind::RecordList(schema) => {
            if let Some(items) = non_empty_list(value, path, issues) {
                for (idx, item) in items.iter().enumerate() {
                    let item_path = join(path, &idx.to_string());
                    match item.as_object() {
                        Some(nested) => check_record(schema, nested, &item_path, issues),
                        None => issues.push(ValidationIssue::new(
                            item_path,
                            IssueCode::NotAnObject,
                            format!("Input should be a valid {}", schema.name),
                        )),
                    }
                }
            }
        }
    }
}

fn check_text(value: &Value, path: &str, empty_code: IssueCode, issues: &mut Vec<ValidationIssue>) {
    match value.as_str() {
        None => issues.push(not_a_string(path)),
        Some(s) if s.trim().is_empty() => issues.push(ValidationIssue::new(
            path,
            empty_code,
            "Value must not be empty or whitespace only",
        )),
        Some(_) => {}
    }
}

/// Return the list's elements if `value` is a non-empty array; otherwise
/// record why not.
fn non_empty_list<'v>(
    value: &'v Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'v Vec<Value>> {
    match value.as_array() {
        None => {
            issues.push(ValidationIssue::new(path, IssueCode::NotAList, "Input should be a valid list"));
            None
        }
        Some(items) if items.is_empty() => {
            issues.push(ValidationIssue::new(
                path,
                IssueCode::EmptyList,
                "List should have at least 1 item",
            ));
            None
        }
        Some(items) => Some(items),
    }
}

fn not_a_string(path: &str) -> ValidationIssue {
    ValidationIssue::new(path, IssueCode::NotAString, "Input should be a valid string")
}

fn quoted_choices(allowed: &[&str]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|v| format!("'{v}'")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
        Some((only, _)) => only.clone(),
        None => String::from("nothing"),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
