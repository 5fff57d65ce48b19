//! Declarative payload schemas, one per working stage.
//!
//! A schema is plain data: an ordered list of field descriptors, each naming
//! a constraint kind. The gate walks these descriptors generically; nothing
//! here knows how validation is carried out.
//!
//! Every schema is closed. A payload field the schema does not declare is an
//! error, not something to ignore.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use interlock_contracts::stage::Stage;

/// Values accepted by `record_and_finalize.outcome`.
pub const OUTCOME_VALUES: &[&str] = &["success", "partial", "blocked"];

/// The constraint attached to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string that is non-empty after trimming.
    Text,
    /// A non-empty list of strings, each non-empty after trimming.
    TextList,
    /// A string that, once trimmed, is one of a fixed set of tokens.
    Literal(&'static [&'static str]),
    /// A non-empty list of nested records, each checked against its schema.
    RecordList(&'static RecordSchema),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A closed record: the payload of one stage, or a nested list item.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Text }
}

const fn text_list(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::TextList }
}

const fn literal(name: &'static str, values: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Literal(values) }
}

const fn records(name: &'static str, schema: &'static RecordSchema) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::RecordList(schema) }
}

// ── Nested records ────────────────────────────────────────────────────────────

pub static EVIDENCE_ITEM: RecordSchema = RecordSchema {
    name: "EvidenceItem",
    fields: &[text("source_id"), text("source_type"), text("locator"), text("snippet")],
};

pub static PLAN_STEP: RecordSchema = RecordSchema {
    name: "PlanStep",
    fields: &[
        text("step_id"),
        text("intent"),
        text_list("requirement_refs"),
        text_list("evidence_refs"),
    ],
};

// ── Stage payloads ────────────────────────────────────────────────────────────

pub static FETCH_TICKET: RecordSchema = RecordSchema {
    name: "FetchTicketPayload",
    fields: &[
        text("external_source"),
        text("external_ticket_id"),
        text("title"),
        text("description"),
    ],
};

pub static EXTRACT_REQUIREMENTS: RecordSchema = RecordSchema {
    name: "ExtractRequirementsPayload",
    fields: &[
        text_list("acceptance_criteria"),
        text_list("constraints"),
        text_list("unknowns"),
    ],
};

pub static SCOPE_CONTEXT: RecordSchema = RecordSchema {
    name: "ScopeContextPayload",
    fields: &[text_list("retrieval_targets"), text("retrieval_justification")],
};

pub static GATHER_EVIDENCE: RecordSchema = RecordSchema {
    name: "GatherEvidencePayload",
    fields: &[records("evidence_items", &EVIDENCE_ITEM)],
};

pub static PROPOSE_PLAN: RecordSchema = RecordSchema {
    name: "ProposePlanPayload",
    fields: &[records("plan_steps", &PLAN_STEP)],
};

pub static ACT_VIA_TOOLS: RecordSchema = RecordSchema {
    name: "ActViaToolsPayload",
    fields: &[text_list("actions_taken"), text_list("outputs"), text_list("checkpoints")],
};

pub static RECORD_AND_FINALIZE: RecordSchema = RecordSchema {
    name: "RecordAndFinalizePayload",
    fields: &[
        text_list("artifacts"),
        text("final_summary"),
        literal("outcome", OUTCOME_VALUES),
    ],
};

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Render this record as a JSON Schema document.
    ///
    /// `pattern: "\\S"` expresses "non-empty after trimming"; literal fields
    /// tolerate the same surrounding whitespace the gate trims away.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), field_json_schema(f.kind)))
            .collect();
        json!({
            "title": self.name,
            "type": "object",
            "additionalProperties": false,
            "required": self.field_names().collect::<Vec<_>>(),
            "properties": properties,
        })
    }
}

fn field_json_schema(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Text => json!({ "type": "string", "pattern": "\\S" }),
        FieldKind::TextList => json!({
            "type": "array",
            "minItems": 1,
            "items": { "type": "string", "pattern": "\\S" },
        }),
        FieldKind::Literal(values) => json!({
            "type": "string",
            "pattern": format!("^\\s*({})\\s*$", values.join("|")),
            "description": format!("one of: {}", values.join(", ")),
        }),
        FieldKind::RecordList(schema) => json!({
            "type": "array",
            "minItems": 1,
            "items": schema.to_json_schema(),
        }),
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// Stage → payload schema lookup.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    schemas: BTreeMap<Stage, &'static RecordSchema>,
}

impl SchemaCatalog {
    /// A catalog with nothing registered.
    pub fn empty() -> Self {
        Self {
            schemas: BTreeMap::new(),
        }
    }

    /// The seven working-stage schemas.
    pub fn standard() -> Self {
        Self::empty()
            .with_schema(Stage::FetchTicket, &FETCH_TICKET)
            .with_schema(Stage::ExtractRequirements, &EXTRACT_REQUIREMENTS)
            .with_schema(Stage::ScopeContext, &SCOPE_CONTEXT)
            .with_schema(Stage::GatherEvidence, &GATHER_EVIDENCE)
            .with_schema(Stage::ProposePlan, &PROPOSE_PLAN)
            .with_schema(Stage::ActViaTools, &ACT_VIA_TOOLS)
            .with_schema(Stage::RecordAndFinalize, &RECORD_AND_FINALIZE)
    }

    /// Register (or replace) the schema for `stage`.
    pub fn with_schema(mut self, stage: Stage, schema: &'static RecordSchema) -> Self {
        self.schemas.insert(stage, schema);
        self
    }

    pub fn get(&self, stage: Stage) -> Option<&'static RecordSchema> {
        self.schemas.get(&stage).copied()
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.schemas.keys().copied()
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
