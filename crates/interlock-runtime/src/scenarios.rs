//! End-to-end scenarios against the real gate and stores.
//!
//! Every test goes through the JSON text boundary: the envelope the server
//! issued is edited the way an agent would edit it, serialized, and
//! submitted back.

use std::sync::Arc;

use serde_json::{json, Value};

use interlock_audit::{FsStore, InMemoryStore, GLOBAL_SCOPE};
use interlock_config::{InterlockConfig, StorageBackend};
use interlock_contracts::{
    envelope::{HistoryResult, TicketEnvelope, ValidationState},
    event::EventType,
    gate::{GateStatus, IssueCode},
    response::SubmitResponse,
    stage::Stage,
};
use interlock_core::{
    registry::{self, AGENT_ROLE_BAD_INPUT, AGENT_ROLE_COMPLETE, AGENT_ROLE_FAIL_CLOSED},
    traits::SnapshotStore,
    RunOrchestrator,
};
use interlock_schema::{samples::sample_payload, SchemaCatalog, StagePayloadGate};

use crate::walkthrough::drive_to_end;
use crate::wiring::{build_runtime, in_memory_runtime, Runtime};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn submit_with(runtime: &Runtime, envelope: &TicketEnvelope, payload: Value) -> SubmitResponse {
    let mut edited = envelope.clone();
    edited.payload = payload.as_object().cloned().unwrap();
    runtime.orchestrator.submit(&edited.to_json(true).unwrap()).unwrap()
}

fn updated(response: &SubmitResponse) -> TicketEnvelope {
    response.updated_envelope.clone().expect("response must carry an envelope")
}

/// Begin a run and drive it with sample payloads until it sits at `stage`.
fn run_at(runtime: &Runtime, stage: Stage) -> TicketEnvelope {
    let mut envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
    while envelope.state != stage {
        let state = envelope.state;
        envelope = updated(&submit_with(runtime, &envelope, Value::Object(sample_payload(state))));
        assert_ne!(envelope.state, state, "sample payload for {state} did not advance");
    }
    envelope
}

fn fetch_payload(external_source: &str) -> Value {
    json!({
        "external_source": external_source,
        "external_ticket_id": "X-1",
        "title": "t",
        "description": "d",
    })
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// A: a new run starts at fetch_ticket with nothing filled in.
#[test]
fn scenario_a_begin_run() {
    let runtime = in_memory_runtime();
    let envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();

    assert_eq!(envelope.state, Stage::FetchTicket);
    assert!(envelope.payload.is_empty());
    assert_eq!(
        envelope.required_fields,
        vec!["external_source", "external_ticket_id", "title", "description"]
    );
    assert_eq!(envelope.history.len(), 1);
    assert_eq!(envelope.history.entries()[0].result, HistoryResult::Initialized);
}

/// B: a complete fetch_ticket payload advances and the payload resets.
#[test]
fn scenario_b_valid_payload_advances() {
    let runtime = in_memory_runtime();
    let envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();

    let response = submit_with(&runtime, &envelope, fetch_payload("jira"));

    assert!(response.proceed);
    assert_eq!(response.gate_result.as_ref().unwrap().status, GateStatus::Pass);
    let next = updated(&response);
    assert_eq!(next.state, Stage::ExtractRequirements);
    assert!(next.payload.is_empty());
    assert_eq!(next.agent_role, registry::role_of(Stage::ExtractRequirements));
    assert_eq!(response.next_state, Some(Stage::ExtractRequirements));
}

/// C: an empty required field asks for a retry at the same stage.
#[test]
fn scenario_c_empty_field_is_retry() {
    let runtime = in_memory_runtime();
    let envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();

    let response = submit_with(&runtime, &envelope, fetch_payload(""));

    assert!(response.proceed);
    let gate = response.gate_result.as_ref().unwrap();
    assert_eq!(gate.status, GateStatus::Retry);
    assert_eq!(gate.missing_or_invalid_fields, vec!["external_source"]);
    assert!(gate.fixes.is_some());

    let same = updated(&response);
    assert_eq!(same.state, Stage::FetchTicket);
    assert_eq!(same.validation.status, ValidationState::InvalidFixable);
    assert_eq!(same.payload.get("title"), Some(&json!("t")));
    assert_eq!(same.history.last().unwrap().result, HistoryResult::Retry);

    let fixed = submit_with(&runtime, &same, fetch_payload("jira"));
    assert_eq!(updated(&fixed).state, Stage::ExtractRequirements);
}

/// D: a stale schema version fails the run closed, permanently.
#[test]
fn scenario_d_version_mismatch_fails_closed() {
    let runtime = in_memory_runtime();
    let mut envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
    envelope.schema_version = "0.9.0".to_string();

    let response = submit_with(&runtime, &envelope, fetch_payload("jira"));

    assert!(!response.proceed);
    let blocked = updated(&response);
    assert_eq!(blocked.state, Stage::FailClosed);
    assert_eq!(blocked.agent_role, AGENT_ROLE_FAIL_CLOSED);
    assert_eq!(blocked.validation.status, ValidationState::InvalidBlocking);
    let report = blocked.invalidation_report.clone().unwrap();
    assert_eq!(report.reason_code, IssueCode::SchemaVersionMismatch);
    assert!(!report.fixable);
    assert_eq!(report.missing_or_invalid_fields, vec!["schema_version"]);

    // Correcting the version does not reopen the run.
    let mut retried = blocked.clone();
    retried.schema_version = runtime.orchestrator.schema_version().to_string();
    let again = submit_with(&runtime, &retried, fetch_payload("jira"));
    assert!(!again.proceed);
    assert_eq!(updated(&again).state, Stage::FailClosed);
    assert_eq!(updated(&again).history.len(), blocked.history.len());
}

/// E: an outcome outside the allowed set is an itemized retry.
#[test]
fn scenario_e_outcome_outside_enumeration() {
    let runtime = in_memory_runtime();
    let envelope = run_at(&runtime, Stage::RecordAndFinalize);

    let mut payload = sample_payload(Stage::RecordAndFinalize);
    payload.insert("outcome".to_string(), json!("done"));
    let response = submit_with(&runtime, &envelope, Value::Object(payload));

    assert!(response.proceed);
    let gate = response.gate_result.as_ref().unwrap();
    assert_eq!(gate.status, GateStatus::Retry);
    assert_eq!(gate.missing_or_invalid_fields, vec!["outcome"]);
    assert_eq!(gate.issues[0].code, IssueCode::InvalidLiteral);
    assert_eq!(updated(&response).state, Stage::RecordAndFinalize);
}

/// F: seven valid submits complete the run.
#[test]
fn scenario_f_full_run_completes() {
    let runtime = in_memory_runtime();
    let envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();

    let (steps, done) = drive_to_end(&runtime.orchestrator, envelope).unwrap();

    assert_eq!(steps.len(), 7);
    assert!(!steps.last().unwrap().proceed);
    assert_eq!(done.state, Stage::Complete);
    assert_eq!(done.agent_role, AGENT_ROLE_COMPLETE);

    let results: Vec<HistoryResult> = done.history.iter().map(|h| h.result).collect();
    assert_eq!(results.iter().filter(|r| **r == HistoryResult::Initialized).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, HistoryResult::Advanced | HistoryResult::Completed))
            .count(),
        7
    );
    assert_eq!(results.len(), 8);
    assert_eq!(results.last(), Some(&HistoryResult::Completed));
}

// ── Properties ────────────────────────────────────────────────────────────────

#[test]
fn terminal_submit_is_idempotent() {
    let runtime = in_memory_runtime();
    let (_, done) = drive_to_end(
        &runtime.orchestrator,
        runtime.orchestrator.begin_run("T-1", None).unwrap(),
    )
    .unwrap();

    for _ in 0..2 {
        let response = submit_with(&runtime, &done, json!({ "anything": "goes" }));
        assert!(!response.proceed);
        let echoed = updated(&response);
        assert_eq!(echoed.state, Stage::Complete);
        assert_eq!(echoed.history.len(), done.history.len());
        assert_eq!(response.gate_result.unwrap().status, GateStatus::Stop);
    }
}

#[test]
fn stale_version_leaves_finished_runs_alone() {
    let runtime = in_memory_runtime();
    let (_, done) = drive_to_end(
        &runtime.orchestrator,
        runtime.orchestrator.begin_run("T-1", None).unwrap(),
    )
    .unwrap();

    let mut failed = runtime.orchestrator.begin_run("T-2", None).unwrap();
    failed.schema_version = "0.9.0".to_string();
    let failed = updated(&runtime.orchestrator.submit(&failed.to_json(false).unwrap()).unwrap());
    assert_eq!(failed.state, Stage::FailClosed);

    for finished in [done, failed] {
        let events_before = runtime.store.export_log(&finished.run_id).unwrap().events.len();
        let mut stale = finished.clone();
        stale.schema_version = "0.9.0".to_string();

        let response = runtime.orchestrator.submit(&stale.to_json(false).unwrap()).unwrap();

        assert!(!response.proceed);
        let gate = response.gate_result.as_ref().unwrap();
        assert_eq!(gate.status, GateStatus::Stop);
        assert_eq!(gate.issues[0].code, IssueCode::SchemaVersionMismatch);
        let echoed = updated(&response);
        assert_eq!(echoed.state, finished.state);
        assert_eq!(echoed.history, finished.history);
        assert_eq!(echoed.invalidation_report, finished.invalidation_report);

        let stored = runtime.orchestrator.latest(&finished.run_id).unwrap().unwrap();
        assert_eq!(stored, finished);
        // only the submit event is added
        let log = runtime.store.export_log(&finished.run_id).unwrap();
        assert_eq!(log.events.len(), events_before + 1);
        assert_eq!(log.events.last().unwrap().event.event_type, EventType::Submit);
    }
}

#[test]
fn history_never_shrinks() {
    let runtime = in_memory_runtime();
    let mut envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();

    let attempts = [
        json!({}),
        fetch_payload(""),
        fetch_payload("jira"),
        json!({ "acceptance_criteria": [] }),
    ];
    for payload in attempts {
        let before = envelope.history.len();
        envelope = updated(&submit_with(&runtime, &envelope, payload));
        assert!(envelope.history.len() >= before);
    }
    assert_eq!(envelope.state, Stage::ExtractRequirements);
}

#[test]
fn server_overwrites_client_derived_fields() {
    let runtime = in_memory_runtime();
    let mut envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
    envelope.agent_role = "skip to the end".to_string();
    envelope.required_fields.clear();
    envelope.next_stage_fields = vec!["nothing".to_string()];

    let response = submit_with(&runtime, &envelope, json!({}));

    let patched = updated(&response);
    assert_eq!(patched.agent_role, registry::role_of(Stage::FetchTicket));
    assert_eq!(patched.required_fields, registry::required_fields_of(Stage::FetchTicket));
    assert_eq!(
        patched.next_stage_fields,
        registry::next_required_fields_of(Stage::FetchTicket)
    );
}

#[test]
fn serialized_envelope_round_trips() {
    let runtime = in_memory_runtime();
    let envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
    let response = submit_with(&runtime, &envelope, fetch_payload("jira"));

    let text = response.serialized_envelope.as_deref().unwrap();
    let parsed = TicketEnvelope::from_json(text).unwrap();
    assert_eq!(parsed, updated(&response));
    assert_eq!(TicketEnvelope::from_json(&parsed.to_json(false).unwrap()).unwrap(), parsed);
}

#[test]
fn malformed_document_leaves_snapshot_alone() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = RunOrchestrator::new(
        Box::new(StagePayloadGate::default()),
        store.clone(),
        store.clone(),
    );
    let envelope = orchestrator.begin_run("T-1", Some("run-e")).unwrap();

    let response = orchestrator.submit("{\"run_id\": \"run-e\", \"state\": ").unwrap();

    assert!(!response.proceed);
    assert!(response.updated_envelope.is_none());
    assert_eq!(response.next_role, AGENT_ROLE_BAD_INPUT);
    assert_eq!(
        response.gate_result.unwrap().issues[0].code,
        IssueCode::JsonDecodeError
    );
    assert_eq!(store.latest_envelope("run-e").unwrap(), Some(envelope));

    let global = store.events(GLOBAL_SCOPE).unwrap();
    assert_eq!(global.last().unwrap().event.event_type, EventType::Rejected);
    assert!(store.events("run-e").unwrap().iter().all(|e| e.event.event_type != EventType::Rejected));
}

#[test]
fn unregistered_stage_fails_closed() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = RunOrchestrator::new(
        Box::new(StagePayloadGate::new(SchemaCatalog::empty())),
        store.clone(),
        store,
    );
    let envelope = orchestrator.begin_run("T-1", None).unwrap();

    let response = orchestrator.submit(&envelope.to_json(false).unwrap()).unwrap();

    assert!(!response.proceed);
    let blocked = response.updated_envelope.unwrap();
    assert_eq!(blocked.state, Stage::FailClosed);
    assert_eq!(
        blocked.invalidation_report.unwrap().reason_code,
        IssueCode::BlockingGateFailure
    );
    assert_eq!(blocked.history.last().unwrap().result, HistoryResult::Blocked);
}

#[test]
fn independent_runs_do_not_interfere() {
    let runtime = in_memory_runtime();
    let a = runtime.orchestrator.begin_run("T-A", None).unwrap();
    let b = runtime.orchestrator.begin_run("T-B", None).unwrap();
    assert_ne!(a.run_id, b.run_id);

    let a_next = updated(&submit_with(&runtime, &a, fetch_payload("jira")));
    assert_eq!(a_next.state, Stage::ExtractRequirements);

    let b_latest = runtime.orchestrator.latest(&b.run_id).unwrap().unwrap();
    assert_eq!(b_latest.state, Stage::FetchTicket);
    assert_eq!(b_latest.history.len(), 1);
}

// ── Filesystem backend ────────────────────────────────────────────────────────

fn filesystem_runtime(dir: &std::path::Path) -> Runtime {
    let config = InterlockConfig::from_toml_str(&format!(
        "[storage]\nbackend = \"filesystem\"\ndir = {:?}\n",
        dir.display().to_string()
    ))
    .unwrap();
    build_runtime(&config).unwrap()
}

#[test]
fn forged_derived_fields_never_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = filesystem_runtime(dir.path());
    let mut envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
    envelope.agent_role = "FORGED ROLE".to_string();
    envelope.required_fields = vec!["nothing".to_string()];

    let retried = updated(&submit_with(&runtime, &envelope, fetch_payload("")));
    assert_eq!(retried.state, Stage::FetchTicket);
    let advanced = updated(&submit_with(&runtime, &envelope, fetch_payload("jira")));
    assert_eq!(advanced.state, Stage::ExtractRequirements);

    let tickets = std::fs::read_to_string(dir.path().join("tickets.jsonl")).unwrap();
    assert_eq!(tickets.lines().count(), 3);
    assert!(!tickets.contains("FORGED ROLE"));
    let snapshot =
        std::fs::read_to_string(dir.path().join("runs").join(&envelope.run_id).join("ticket.json"))
            .unwrap();
    assert!(!snapshot.contains("FORGED ROLE"));
}

#[test]
fn unusable_run_ids_get_retry_responses() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = filesystem_runtime(dir.path());

    for bad in ["team/a", GLOBAL_SCOPE] {
        let response = runtime.orchestrator.begin("T-1", Some(bad)).unwrap();
        assert!(!response.proceed);
        let gate = response.gate_result.unwrap();
        assert_eq!(gate.status, GateStatus::Retry);
        assert_eq!(gate.issues[0].code, IssueCode::InvalidRunId);

        let mut envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
        envelope.run_id = bad.to_string();
        let response = submit_with(&runtime, &envelope, fetch_payload("jira"));
        assert!(!response.proceed);
        assert_eq!(response.next_role, AGENT_ROLE_BAD_INPUT);
        let gate = response.gate_result.unwrap();
        assert_eq!(gate.status, GateStatus::Retry);
        assert_eq!(gate.missing_or_invalid_fields, vec!["run_id"]);
    }

    let global = runtime.store.export_log(GLOBAL_SCOPE).unwrap();
    let last = &global.events.last().unwrap().event;
    assert_eq!(last.event_type, EventType::Rejected);
    assert_eq!(last.run_id, None);
    assert!(global.events.iter().all(|e| e.event.run_id.as_deref() != Some(GLOBAL_SCOPE)));
    assert!(runtime.store.verify_scope(GLOBAL_SCOPE).unwrap());
    assert!(!dir.path().join("runs").join("global").exists());
}

#[test]
fn filesystem_runtime_persists_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let config = InterlockConfig::from_toml_str(&format!(
        "run_id_prefix = \"fs_\"\n[storage]\nbackend = \"filesystem\"\ndir = {:?}\n",
        dir.path().display().to_string()
    ))
    .unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Filesystem);

    let runtime = build_runtime(&config).unwrap();
    let envelope = runtime.orchestrator.begin_run("T-1", None).unwrap();
    assert!(envelope.run_id.starts_with("fs_"));

    let (_, done) = drive_to_end(&runtime.orchestrator, envelope).unwrap();

    let on_disk = FsStore::open(dir.path())
        .unwrap()
        .latest_envelope(&done.run_id)
        .unwrap()
        .unwrap();
    assert_eq!(on_disk, done);
    assert!(runtime.store.verify_scope(&done.run_id).unwrap());
    assert!(runtime.store.verify_scope(GLOBAL_SCOPE).unwrap());

    // begin, then submit + transition for each of the seven stages
    let log = runtime.store.export_log(&done.run_id).unwrap();
    assert_eq!(log.events.len(), 15);
    assert!(dir
        .path()
        .join("runs")
        .join(&done.run_id)
        .join("ticket.json")
        .is_file());
}
