//! The run orchestrator: the submit pipeline.
//!
//! Each submit walks a fixed sequence of checks, any of which may end the
//! call early:
//!
//!   Parse → Version → Terminal → Gate → Transition → Record
//!
//! The server is the only writer of `state`, the derived contract fields,
//! `validation`, `invalidation_report`, and `history`. Whatever the agent
//! echoed back for those is overwritten before the envelope leaves here.
//! `FailClosed` has no exit: the only recovery is a new run.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use interlock_contracts::{
    envelope::{
        check_run_id, peek_run_id, EnvelopeError, History, HistoryEntry, HistoryResult, InvalidationReport,
        Payload, TicketEnvelope, ValidationState, ValidationStatus, SCHEMA_VERSION,
    },
    error::{InterlockError, InterlockResult},
    event::{EventType, RunEvent},
    gate::{GateResult, GateStatus, IssueCode, ValidationIssue},
    response::SubmitResponse,
    stage::Stage,
};

use crate::{
    registry::{self, TransitionStatus, AGENT_ROLE_BAD_INPUT},
    traits::{EventSink, Gate, SnapshotStore},
};

/// Default prefix for generated run ids.
pub const DEFAULT_RUN_ID_PREFIX: &str = "run_";

/// Drives begin/submit round trips for any number of independent runs.
///
/// The orchestrator holds no per-run state. Two submits for the same run
/// must not be issued concurrently; serializing them is the job of the
/// transport in front of it.
pub struct RunOrchestrator {
    gate: Box<dyn Gate>,
    snapshots: Arc<dyn SnapshotStore>,
    events: Arc<dyn EventSink>,
    schema_version: String,
    run_id_prefix: String,
}

impl RunOrchestrator {
    pub fn new(
        gate: Box<dyn Gate>,
        snapshots: Arc<dyn SnapshotStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            gate,
            snapshots,
            events,
            schema_version: SCHEMA_VERSION.to_string(),
            run_id_prefix: DEFAULT_RUN_ID_PREFIX.to_string(),
        }
    }

    /// Override the envelope version this server issues and accepts.
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    pub fn with_run_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_id_prefix = prefix.into();
        self
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Latest stored snapshot for `run_id`.
    pub fn latest(&self, run_id: &str) -> InterlockResult<Option<TicketEnvelope>> {
        self.snapshots.latest_envelope(run_id)
    }

    /// Create a new run at `fetch_ticket`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` (retryable) if `ticket_id`, or an explicitly given
    /// `run_id`, is empty after trimming, or if the `run_id` is path-like or
    /// reserved. Store failures are propagated.
    pub fn begin_run(&self, ticket_id: &str, run_id: Option<&str>) -> InterlockResult<TicketEnvelope> {
        check_begin_arguments(ticket_id, run_id).map_err(|issue| {
            InterlockError::InvalidArgument {
                field: issue.field,
                reason: issue.message,
            }
        })?;

        let ticket_id = ticket_id.trim();
        let run_id = match run_id {
            Some(given) => given.trim().to_string(),
            None => format!("{}{}", self.run_id_prefix, Uuid::new_v4().simple()),
        };

        let stage = Stage::FetchTicket;
        let mut history = History::new();
        history.append(HistoryEntry::now(
            None,
            stage,
            HistoryResult::Initialized,
            "Initial ticket.json issued by server",
        ));

        let now = Utc::now();
        let envelope = TicketEnvelope {
            schema_version: self.schema_version.clone(),
            run_id,
            ticket_id: ticket_id.to_string(),
            state: stage,
            agent_role: registry::role_of(stage).to_string(),
            required_fields: registry::required_fields_of(stage),
            payload: Payload::new(),
            next_stage_fields: registry::next_required_fields_of(stage),
            validation: ValidationStatus::default(),
            invalidation_report: None,
            history,
            created_at: now,
            updated_at: now,
        };

        self.snapshots.save_envelope(&envelope)?;
        self.record(&envelope, EventType::Begin, json!({ "ticket_id": envelope.ticket_id }))?;

        info!(
            run_id = %envelope.run_id,
            ticket_id = %envelope.ticket_id,
            "run started"
        );
        Ok(envelope)
    }

    /// `begin_run` wrapped in the standard response shape.
    ///
    /// An invalid argument becomes a non-continuing response with a `retry`
    /// gate result; only store failures surface as `Err`.
    pub fn begin(&self, ticket_id: &str, run_id: Option<&str>) -> InterlockResult<SubmitResponse> {
        if let Err(issue) = check_begin_arguments(ticket_id, run_id) {
            warn!(field = %issue.field, reason = %issue.message, "begin rejected");
            let reason = issue.message.clone();
            let gate = GateResult::retry(
                reason.clone(),
                "Provide a non-empty ticket_id and, if given, a run_id without path separators",
                vec![issue],
            );
            return respond(None, false, reason, Some(gate));
        }

        let envelope = self.begin_run(ticket_id, run_id)?;
        respond(
            Some(envelope),
            true,
            "Initialized ticket.json at fetch_ticket. Save this file, fill required_fields \
             from the source system, and submit it back.",
            None,
        )
    }

    /// Validate a submitted envelope and advance, retry, or fail the run.
    ///
    /// # Pipeline
    ///
    /// 1. Parse the document. Failure → `continue=false` with a `retry`
    ///    gate result; only a `rejected` event is recorded.
    /// 2. Record a `submit` event. Only envelopes the server has rewritten
    ///    are ever saved as snapshots.
    /// 3. Version check. Mismatch → `FailClosed` (`schema_version_mismatch`),
    ///    unless the run is already terminal: then `stop`, nothing changes.
    /// 4. Terminal check. Already terminal → echo it, nothing saved.
    /// 5. Gate:
    ///    - `retry` → same stage, `invalid_fixable`, `continue=true`
    ///    - `stop`  → `FailClosed` (`blocking_gate_failure`)
    /// 6. Transition to the successor, reset the payload, and record.
    ///
    /// # Errors
    ///
    /// Only store failures. Every protocol outcome is an `Ok` response.
    pub fn submit(&self, document: &str) -> InterlockResult<SubmitResponse> {
        // ── Step 1: Parse ────────────────────────────────────────────────────
        let envelope = match TicketEnvelope::from_json(document) {
            Ok(envelope) => envelope,
            Err(err) => return self.reject(document, err),
        };

        let state = envelope.state;
        debug!(
            run_id = %envelope.run_id,
            state = %state,
            history_len = envelope.history.len(),
            "submit received"
        );

        // ── Step 2: Record receipt ───────────────────────────────────────────
        self.record(&envelope, EventType::Submit, json!({ "ticket_id": envelope.ticket_id }))?;

        // ── Step 3: Version check ────────────────────────────────────────────
        //
        // Before anything else: a stale client never proceeds.
        if envelope.schema_version != self.schema_version {
            warn!(
                run_id = %envelope.run_id,
                expected = %self.schema_version,
                received = %envelope.schema_version,
                "schema version mismatch"
            );
            let message = format!("Expected schema_version '{}'", self.schema_version);
            let issue = ValidationIssue::new(
                "schema_version",
                IssueCode::SchemaVersionMismatch,
                message.clone(),
            );
            let gate = GateResult {
                status: GateStatus::Stop,
                reasons: vec!["schema_version mismatch".to_string()],
                fixes: Some(vec![format!(
                    "Use schema_version '{}' and restart run",
                    self.schema_version
                )]),
                missing_or_invalid_fields: vec!["schema_version".to_string()],
                issues: vec![issue],
            };

            // A finished run keeps its state, history and report.
            let echoed = if state.is_terminal() {
                let mut terminal = envelope;
                apply_contract(&mut terminal, state);
                terminal
            } else {
                self.fail_closed(
                    envelope,
                    IssueCode::SchemaVersionMismatch,
                    message,
                    vec!["schema_version".to_string()],
                )?
            };
            return respond(
                Some(echoed),
                false,
                "Blocking validation failure: schema version mismatch",
                Some(gate),
            );
        }

        // ── Step 4: Terminal short-circuit ───────────────────────────────────
        if state.is_terminal() {
            debug!(run_id = %envelope.run_id, state = %state, "submit on terminal run");
            let mut terminal = envelope;
            apply_contract(&mut terminal, state);
            return respond(
                Some(terminal),
                false,
                format!("Run is already in terminal state '{state}'"),
                Some(GateResult::stop(format!("State '{state}' is terminal"))),
            );
        }

        // ── Step 5: Gate ─────────────────────────────────────────────────────
        let verdict = self.gate.validate(state, &envelope.payload);

        match verdict.status {
            GateStatus::Retry => {
                warn!(
                    run_id = %envelope.run_id,
                    state = %state,
                    fields = ?verdict.missing_or_invalid_fields,
                    "fixable payload errors"
                );
                let mut patched = envelope;
                apply_contract(&mut patched, state);
                patched.validation = ValidationStatus {
                    status: ValidationState::InvalidFixable,
                    errors: verdict.issues.clone(),
                };
                patched.invalidation_report = None;
                patched.history.append(HistoryEntry::now(
                    Some(state),
                    state,
                    HistoryResult::Retry,
                    "Fixable validation errors in payload",
                ));

                self.snapshots.save_envelope(&patched)?;
                self.record(
                    &patched,
                    EventType::Retry,
                    json!({ "fields": verdict.missing_or_invalid_fields }),
                )?;
                return respond(
                    Some(patched),
                    true,
                    "Fixable validation errors. Update required fields and resubmit ticket.json.",
                    Some(verdict),
                );
            }

            GateStatus::Stop => {
                warn!(
                    run_id = %envelope.run_id,
                    state = %state,
                    reasons = ?verdict.reasons,
                    "blocking gate failure"
                );
                let blocked = self.fail_closed(
                    envelope,
                    IssueCode::BlockingGateFailure,
                    "Blocking gate failure. Cannot proceed.".to_string(),
                    verdict.missing_or_invalid_fields.clone(),
                )?;
                return respond(Some(blocked), false, "Blocking validation failure", Some(verdict));
            }

            GateStatus::Pass => {
                debug!(run_id = %envelope.run_id, state = %state, "gate passed");
            }
        }

        // ── Step 6: Transition ───────────────────────────────────────────────
        let transition = registry::advance(state);
        let next = match (transition.status, transition.next_stage) {
            (TransitionStatus::Pass, Some(next)) => next,
            _ => {
                // Unreachable for a non-terminal stage; echo without moving.
                warn!(run_id = %envelope.run_id, state = %state, "transition refused");
                let mut held = envelope;
                apply_contract(&mut held, state);
                held.validation = ValidationStatus::valid();
                self.snapshots.save_envelope(&held)?;
                return respond(Some(held), false, transition.reason, Some(verdict));
            }
        };

        let is_complete = next == Stage::Complete;
        let mut advanced = envelope;
        apply_contract(&mut advanced, next);
        advanced.validation = ValidationStatus::valid();
        advanced.invalidation_report = None;
        advanced.history.append(HistoryEntry::now(
            Some(state),
            next,
            if is_complete {
                HistoryResult::Completed
            } else {
                HistoryResult::Advanced
            },
            transition.reason.clone(),
        ));

        self.snapshots.save_envelope(&advanced)?;
        self.record(
            &advanced,
            EventType::Transition,
            json!({ "from_state": state, "to_state": next }),
        )?;

        info!(
            run_id = %advanced.run_id,
            from = %state,
            to = %next,
            "run advanced"
        );
        respond(Some(advanced), !is_complete, transition.reason, Some(verdict))
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Respond to a document that is not a readable envelope. The stored
    /// snapshot is left untouched; only a `rejected` event is written.
    fn reject(&self, document: &str, err: EnvelopeError) -> InterlockResult<SubmitResponse> {
        let issues = err.issues();
        let (reason, gate) = match &err {
            EnvelopeError::Decode(e) => (
                format!("Invalid JSON: {e}"),
                GateResult::retry(
                    "ticket_json must be valid JSON",
                    "Serialize ticket.json as valid JSON before submitting",
                    issues,
                ),
            ),
            EnvelopeError::Invalid(_) => (
                "Ticket schema validation failed".to_string(),
                GateResult::retry(
                    "ticket_json does not match required envelope schema",
                    "Ensure all required ticket envelope fields are present and non-empty",
                    issues,
                ),
            ),
        };

        let run_id = peek_run_id(document);
        warn!(
            run_id = ?run_id,
            fields = ?gate.missing_or_invalid_fields,
            "submitted document rejected"
        );
        self.events.append_event(&RunEvent::now(
            run_id,
            EventType::Rejected,
            None,
            json!({ "fields": gate.missing_or_invalid_fields }),
        ))?;

        respond(None, false, reason, Some(gate))
    }

    /// Force the run into `FailClosed` with a blocking invalidation report.
    fn fail_closed(
        &self,
        mut envelope: TicketEnvelope,
        reason_code: IssueCode,
        message: String,
        fields: Vec<String>,
    ) -> InterlockResult<TicketEnvelope> {
        let from = envelope.state;
        let issue = ValidationIssue::new(
            fields.first().map_or("payload", String::as_str),
            reason_code,
            message.clone(),
        );

        apply_contract(&mut envelope, Stage::FailClosed);
        envelope.validation = ValidationStatus {
            status: ValidationState::InvalidBlocking,
            errors: vec![issue],
        };
        envelope.invalidation_report = Some(InvalidationReport {
            state: from,
            reason_code,
            fixable: false,
            missing_or_invalid_fields: fields.clone(),
            required_next_action: message.clone(),
        });
        envelope.history.append(HistoryEntry::now(
            Some(from),
            Stage::FailClosed,
            HistoryResult::Blocked,
            message,
        ));

        self.snapshots.save_envelope(&envelope)?;
        self.record(
            &envelope,
            EventType::FailClosed,
            json!({ "reason_code": reason_code, "fields": fields }),
        )?;

        warn!(
            run_id = %envelope.run_id,
            from = %from,
            reason_code = %reason_code,
            "run fail-closed"
        );
        Ok(envelope)
    }

    fn record(
        &self,
        envelope: &TicketEnvelope,
        event_type: EventType,
        details: serde_json::Value,
    ) -> InterlockResult<()> {
        self.events.append_event(&RunEvent::now(
            Some(envelope.run_id.clone()),
            event_type,
            Some(envelope.state),
            details,
        ))
    }
}

/// Validate `begin_run` arguments, returning the first problem found.
fn check_begin_arguments(ticket_id: &str, run_id: Option<&str>) -> Result<(), ValidationIssue> {
    if ticket_id.trim().is_empty() {
        return Err(ValidationIssue::new(
            "ticket_id",
            IssueCode::EmptyString,
            "ticket_id must not be empty",
        ));
    }
    if let Some(given) = run_id {
        let given = given.trim();
        if given.is_empty() {
            return Err(ValidationIssue::new(
                "run_id",
                IssueCode::EmptyString,
                "run_id must not be empty",
            ));
        }
        check_run_id(given)
            .map_err(|reason| ValidationIssue::new("run_id", IssueCode::InvalidRunId, reason))?;
    }
    Ok(())
}

/// Move `envelope` to `stage` and overwrite every server-derived field.
/// The payload is cleared whenever the stage changes.
fn apply_contract(envelope: &mut TicketEnvelope, stage: Stage) {
    if envelope.state != stage {
        envelope.payload.clear();
    }
    envelope.state = stage;
    envelope.agent_role = registry::role_of(stage).to_string();
    envelope.required_fields = registry::required_fields_of(stage);
    envelope.next_stage_fields = registry::next_required_fields_of(stage);
    envelope.updated_at = Utc::now();
}

fn respond(
    envelope: Option<TicketEnvelope>,
    proceed: bool,
    reason: impl Into<String>,
    gate_result: Option<GateResult>,
) -> InterlockResult<SubmitResponse> {
    let serialized_envelope = envelope.as_ref().map(|e| e.to_json(true)).transpose()?;
    let next_role = envelope
        .as_ref()
        .map_or_else(|| AGENT_ROLE_BAD_INPUT.to_string(), |e| e.agent_role.clone());
    let next_state = envelope.as_ref().map(|e| e.state);
    Ok(SubmitResponse {
        updated_envelope: envelope,
        serialized_envelope,
        proceed,
        reason: reason.into(),
        next_role,
        next_state,
        gate_result,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────
