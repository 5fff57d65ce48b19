//! Chained event and exported log types.
//!
//! `ChainedEvent` wraps a `RunEvent` with its position in a scope's chain and
//! the SHA-256 hashes that make tampering detectable. `EventLog` is the
//! exported view of one scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use interlock_contracts::{envelope::RESERVED_RUN_ID, event::RunEvent};

/// Scope name of the log that receives every event, including rejected
/// documents that carry no run id. No run may take this id.
pub const GLOBAL_SCOPE: &str = RESERVED_RUN_ID;

/// The sentinel `prev_hash` used for the first event in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A single entry in the SHA-256 hash chain of one scope.
///
/// Each event commits to the previous one via `prev_hash`. Changing any
/// field, including those of the embedded `event`, invalidates `this_hash`
/// and every later `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedEvent {
    /// Position in the scope's chain, starting at 0.
    pub sequence: u64,

    /// A run id, or `GLOBAL_SCOPE`.
    pub scope: String,

    pub event: RunEvent,

    /// Hash of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Computed by `hash_event()` over (scope, sequence, prev_hash,
    /// canonical JSON of event).
    pub this_hash: String,
}

/// Every event of one scope, in chain order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    pub scope: String,
    pub events: Vec<ChainedEvent>,
    pub exported_at: DateTime<Utc>,
    /// The `this_hash` of the last event. Empty if the log is empty.
    pub terminal_hash: String,
}

impl EventLog {
    pub fn new(scope: impl Into<String>, events: Vec<ChainedEvent>) -> Self {
        let terminal_hash = events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();
        Self {
            scope: scope.into(),
            events,
            exported_at: Utc::now(),
            terminal_hash,
        }
    }
}
