//! Hash-chain primitives: hashing, sealing, and integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. scope as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of the run event (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use interlock_contracts::{error::InterlockResult, event::RunEvent};

use crate::event::{ChainedEvent, GENESIS_HASH};

/// Compute the SHA-256 hash for one chained event.
///
/// Returns a lowercase 64-character hex string.
///
/// # Errors
///
/// `Serialization` if `event` cannot be encoded as JSON.
pub fn hash_event(
    scope: &str,
    sequence: u64,
    event: &RunEvent,
    prev_hash: &str,
) -> InterlockResult<String> {
    let event_json = serde_json::to_vec(event)?;

    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&event_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of one scope's chain.
///
/// Returns `true` when every event satisfies both rules:
///
/// 1. **Linkage**: `prev_hash` equals the previous event's `this_hash`
///    (or `GENESIS_HASH` for the first), and `sequence` equals its index.
/// 2. **Correctness**: `this_hash` matches the hash recomputed from the
///    event's own fields.
///
/// An empty chain is valid.
pub fn verify_chain(events: &[ChainedEvent]) -> bool {
    let mut expected_prev = GENESIS_HASH.to_string();

    for (idx, event) in events.iter().enumerate() {
        if event.prev_hash != expected_prev || event.sequence != idx as u64 {
            return false;
        }

        match hash_event(&event.scope, event.sequence, &event.event, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}

/// The tip of one scope's chain: where the next event goes and what it
/// links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub sequence: u64,
    pub last_hash: String,
}

impl ChainHead {
    pub fn genesis() -> Self {
        Self {
            sequence: 0,
            last_hash: GENESIS_HASH.to_string(),
        }
    }

    /// The head that follows `events`, or genesis if there are none.
    pub fn after(events: &[ChainedEvent]) -> Self {
        match events.last() {
            Some(last) => Self {
                sequence: last.sequence + 1,
                last_hash: last.this_hash.clone(),
            },
            None => Self::genesis(),
        }
    }

    /// Wrap `event` as the next link of `scope` and advance the head.
    pub fn seal(&mut self, scope: &str, event: &RunEvent) -> InterlockResult<ChainedEvent> {
        let this_hash = hash_event(scope, self.sequence, event, &self.last_hash)?;
        let chained = ChainedEvent {
            sequence: self.sequence,
            scope: scope.to_string(),
            event: event.clone(),
            prev_hash: self.last_hash.clone(),
            this_hash: this_hash.clone(),
        };
        self.sequence += 1;
        self.last_hash = this_hash;
        Ok(chained)
    }
}

impl Default for ChainHead {
    fn default() -> Self {
        Self::genesis()
    }
}
