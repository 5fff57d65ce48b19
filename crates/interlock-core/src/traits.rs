//! Trait seams around the submit pipeline.
//!
//! - `Gate`: pure payload validator for one stage
//! - `SnapshotStore`: holds the latest envelope per run
//! - `EventSink`: append-only run event log
//!
//! The orchestrator owns one of each. Stores are external collaborators:
//! the pipeline calls them at its boundary and never inspects how they
//! persist anything.

use interlock_contracts::{
    envelope::{Payload, TicketEnvelope},
    error::InterlockResult,
    event::RunEvent,
    gate::GateResult,
    stage::Stage,
};

/// Validates a stage payload.
///
/// Implementations must be deterministic: the same `(stage, payload)` pair
/// always yields an identical `GateResult`, issue order included. Structural
/// problems are reported as data, never as panics or errors.
pub trait Gate: Send + Sync {
    fn validate(&self, stage: Stage, payload: &Payload) -> GateResult;
}

/// Latest-snapshot storage, one canonical envelope per run.
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot for `envelope.run_id`.
    fn save_envelope(&self, envelope: &TicketEnvelope) -> InterlockResult<()>;

    /// Return the most recently saved snapshot for `run_id`, if any.
    fn latest_envelope(&self, run_id: &str) -> InterlockResult<Option<TicketEnvelope>>;
}

/// Append-only event log.
///
/// Events written here are never modified or deleted.
pub trait EventSink: Send + Sync {
    fn append_event(&self, event: &RunEvent) -> InterlockResult<()>;
}
