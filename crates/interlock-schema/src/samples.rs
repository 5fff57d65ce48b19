//! Sample payloads that satisfy each stage schema.
//!
//! Used by the reference walkthrough, by `interlock schema --example`, and
//! as test fixtures across the workspace. The ticket is fictional.

use serde_json::json;

use interlock_contracts::{envelope::Payload, stage::Stage};

/// A valid payload for `stage`. Terminals take no payload and get an empty
/// map.
pub fn sample_payload(stage: Stage) -> Payload {
    let value = match stage {
        Stage::FetchTicket => json!({
            "external_source": "jira",
            "external_ticket_id": "PAY-1432",
            "title": "Retry webhook deliveries with backoff",
            "description": "Webhook deliveries that fail with 5xx are dropped. Retry them with exponential backoff.",
        }),
        Stage::ExtractRequirements => json!({
            "acceptance_criteria": [
                "Failed deliveries are retried up to 5 times",
                "Delay doubles between attempts starting at 2s",
            ],
            "constraints": ["No new infrastructure dependencies"],
            "unknowns": ["Whether 429 responses should be retried"],
        }),
        Stage::ScopeContext => json!({
            "retrieval_targets": ["src/webhooks/dispatch.rs", "docs/webhooks.md"],
            "retrieval_justification": "Dispatch owns the delivery loop; the docs state the current retry promise.",
        }),
        Stage::GatherEvidence => json!({
            "evidence_items": [
                {
                    "source_id": "dispatch.rs",
                    "source_type": "code",
                    "locator": "src/webhooks/dispatch.rs#L88-L104",
                    "snippet": "if status.is_server_error() { return Err(DeliveryError::Dropped); }",
                },
            ],
        }),
        Stage::ProposePlan => json!({
            "plan_steps": [
                {
                    "step_id": "S1",
                    "intent": "Wrap delivery in a bounded retry loop with doubling delay",
                    "requirement_refs": ["AC1", "AC2"],
                    "evidence_refs": ["dispatch.rs"],
                },
            ],
        }),
        Stage::ActViaTools => json!({
            "actions_taken": ["Edited src/webhooks/dispatch.rs"],
            "outputs": ["cargo test webhooks: 14 passed"],
            "checkpoints": ["S1 done"],
        }),
        Stage::RecordAndFinalize => json!({
            "artifacts": ["commit 4f1c2ab"],
            "final_summary": "Server-error deliveries now retry five times with exponential backoff.",
            "outcome": "success",
        }),
        Stage::Complete | Stage::FailClosed => json!({}),
    };
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}
