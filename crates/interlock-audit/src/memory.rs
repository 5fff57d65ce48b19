//! In-memory snapshot store and event sink.
//!
//! `InMemoryStore` keeps the latest envelope per run in a map and every
//! event in hash-chained per-scope logs, all behind one `Mutex`. It backs
//! the walkthrough and the test suites; nothing survives the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use interlock_contracts::{
    envelope::TicketEnvelope,
    error::{InterlockError, InterlockResult},
    event::RunEvent,
};
use interlock_core::traits::{EventSink, SnapshotStore};

use crate::{
    chain::{verify_chain, ChainHead},
    event::{ChainedEvent, EventLog, GLOBAL_SCOPE},
};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct ScopeLog {
    pub(crate) events: Vec<ChainedEvent>,
    pub(crate) head: ChainHead,
}

impl ScopeLog {
    fn append(&mut self, scope: &str, event: &RunEvent) -> InterlockResult<()> {
        let chained = self.head.seal(scope, event)?;
        self.events.push(chained);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryState {
    pub(crate) snapshots: HashMap<String, TicketEnvelope>,
    pub(crate) logs: BTreeMap<String, ScopeLog>,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory store implementing both `SnapshotStore` and `EventSink`.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> InterlockResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| InterlockError::StoreWriteFailed {
            reason: format!("store lock poisoned: {e}"),
        })
    }

    /// The chained events of `scope` (a run id or `GLOBAL_SCOPE`), in order.
    pub fn events(&self, scope: &str) -> InterlockResult<Vec<ChainedEvent>> {
        Ok(self
            .lock()?
            .logs
            .get(scope)
            .map(|log| log.events.clone())
            .unwrap_or_default())
    }

    pub fn export_log(&self, scope: &str) -> InterlockResult<EventLog> {
        Ok(EventLog::new(scope, self.events(scope)?))
    }

    /// Verify that `scope`'s chain has not been tampered with.
    pub fn verify_integrity(&self, scope: &str) -> InterlockResult<bool> {
        Ok(verify_chain(&self.events(scope)?))
    }

    /// Run ids with a stored snapshot, sorted.
    pub fn run_ids(&self) -> InterlockResult<Vec<String>> {
        let mut ids: Vec<String> = self.lock()?.snapshots.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// ── Trait impls ───────────────────────────────────────────────────────────────

impl SnapshotStore for InMemoryStore {
    fn save_envelope(&self, envelope: &TicketEnvelope) -> InterlockResult<()> {
        self.lock()?
            .snapshots
            .insert(envelope.run_id.clone(), envelope.clone());
        Ok(())
    }

    fn latest_envelope(&self, run_id: &str) -> InterlockResult<Option<TicketEnvelope>> {
        Ok(self.lock()?.snapshots.get(run_id).cloned())
    }
}

impl EventSink for InMemoryStore {
    /// Append to the run's own chain (when the event names a run) and to
    /// the global chain.
    fn append_event(&self, event: &RunEvent) -> InterlockResult<()> {
        let mut state = self.lock()?;

        if let Some(run_id) = &event.run_id {
            if run_id == GLOBAL_SCOPE {
                return Err(InterlockError::StoreWriteFailed {
                    reason: format!("run_id '{run_id}' is reserved for the global chain"),
                });
            }
            state
                .logs
                .entry(run_id.clone())
                .or_default()
                .append(run_id, event)?;
        }
        state
            .logs
            .entry(GLOBAL_SCOPE.to_string())
            .or_default()
            .append(GLOBAL_SCOPE, event)?;

        debug!(
            run_id = ?event.run_id,
            event_type = ?event.event_type,
            "event appended"
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
