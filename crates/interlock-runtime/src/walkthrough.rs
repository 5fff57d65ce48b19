//! Reference walkthrough: one run driven from `fetch_ticket` to `complete`.
//!
//! The agent side is played by `interlock_schema::samples`, which supplies a
//! valid payload for every working stage. Each round trip goes through the
//! same JSON text boundary a real agent would use.

use serde::Serialize;
use tracing::{info, warn};

use interlock_contracts::{
    envelope::TicketEnvelope,
    error::{InterlockError, InterlockResult},
    gate::GateStatus,
    stage::Stage,
};
use interlock_core::RunOrchestrator;
use interlock_schema::samples::sample_payload;

use crate::wiring::{in_memory_runtime, Runtime};

/// One submit of the walkthrough.
#[derive(Debug, Clone, Serialize)]
pub struct WalkthroughStep {
    pub submitted_state: Stage,
    pub gate_status: Option<GateStatus>,
    #[serde(rename = "continue")]
    pub proceed: bool,
    pub reason: String,
    pub next_state: Option<Stage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkthroughReport {
    pub run_id: String,
    pub ticket_id: String,
    pub steps: Vec<WalkthroughStep>,
    pub final_envelope: TicketEnvelope,
    /// Whether the run's event chain verified after the last step.
    pub chain_intact: bool,
}

/// Fill `envelope` with the sample payload for its stage and submit it until
/// the run stops asking for more.
///
/// Stops early if a submit leaves the stage unchanged, so a payload the gate
/// rejects cannot loop forever.
pub fn drive_to_end(
    orchestrator: &RunOrchestrator,
    mut envelope: TicketEnvelope,
) -> InterlockResult<(Vec<WalkthroughStep>, TicketEnvelope)> {
    let mut steps = Vec::new();

    while !envelope.state.is_terminal() {
        let submitted_state = envelope.state;
        envelope.payload = sample_payload(submitted_state);
        let document = envelope.to_json(true)?;

        let response = orchestrator.submit(&document)?;
        steps.push(WalkthroughStep {
            submitted_state,
            gate_status: response.gate_result.as_ref().map(|g| g.status),
            proceed: response.proceed,
            reason: response.reason.clone(),
            next_state: response.next_state,
        });

        let Some(next) = response.updated_envelope else {
            return Err(InterlockError::Serialization {
                reason: format!("server rejected its own envelope: {}", response.reason),
            });
        };
        envelope = next;

        if envelope.state == submitted_state {
            warn!(
                run_id = %envelope.run_id,
                state = %submitted_state,
                "walkthrough stalled"
            );
            break;
        }
        if !response.proceed {
            break;
        }
    }

    Ok((steps, envelope))
}

/// Run the full walkthrough against a fresh in-memory runtime.
pub fn run_walkthrough(ticket_id: &str) -> InterlockResult<WalkthroughReport> {
    run_walkthrough_on(&in_memory_runtime(), ticket_id)
}

/// Run the full walkthrough against `runtime`.
pub fn run_walkthrough_on(runtime: &Runtime, ticket_id: &str) -> InterlockResult<WalkthroughReport> {
    let envelope = runtime.orchestrator.begin_run(ticket_id, None)?;
    let run_id = envelope.run_id.clone();
    let ticket_id = envelope.ticket_id.clone();

    let (steps, final_envelope) = drive_to_end(&runtime.orchestrator, envelope)?;
    let chain_intact = runtime.store.verify_scope(&run_id)?;

    info!(
        run_id = %run_id,
        steps = steps.len(),
        final_state = %final_envelope.state,
        chain_intact,
        "walkthrough finished"
    );

    Ok(WalkthroughReport {
        run_id,
        ticket_id,
        steps,
        final_envelope,
        chain_intact,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
