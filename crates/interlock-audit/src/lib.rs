//! # interlock-audit
//!
//! Persistence for the Interlock runtime: latest-envelope snapshots and an
//! append-only, SHA-256 hash-chained run event log.
//!
//! ## Overview
//!
//! Every event the orchestrator records is wrapped in a `ChainedEvent` that
//! links to the previous event of the same scope via its hash. Each run has
//! its own chain, and a global chain receives every event, including
//! rejected documents that carry no run id. Editing any stored event breaks
//! its chain and is detected by `verify_chain`.
//!
//! Two stores implement both `SnapshotStore` and `EventSink`:
//!
//! - [`InMemoryStore`] for tests and walkthroughs
//! - [`FsStore`] for the on-disk `runs/<run_id>/…` layout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use interlock_audit::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let orchestrator = RunOrchestrator::new(gate, store.clone(), store.clone());
//! let envelope = orchestrator.begin_run("T-1", None)?;
//!
//! assert!(store.verify_integrity(&envelope.run_id)?);
//! ```

pub mod chain;
pub mod event;
pub mod fs;
pub mod memory;

pub use chain::{hash_event, verify_chain, ChainHead};
pub use event::{ChainedEvent, EventLog, GENESIS_HASH, GLOBAL_SCOPE};
pub use fs::FsStore;
pub use memory::InMemoryStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use interlock_contracts::{
        envelope::{History, TicketEnvelope, ValidationStatus, SCHEMA_VERSION},
        event::{EventType, RunEvent},
        stage::Stage,
    };
    use interlock_core::traits::SnapshotStore;

    use super::{hash_event, verify_chain, ChainHead, InMemoryStore, GENESIS_HASH};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_event(details: &str) -> RunEvent {
        RunEvent::now(
            Some("run-1".to_string()),
            EventType::Submit,
            Some(Stage::ScopeContext),
            json!({ "note": details }),
        )
    }

    fn make_envelope(run_id: &str, state: Stage) -> TicketEnvelope {
        let now = Utc::now();
        TicketEnvelope {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run_id.to_string(),
            ticket_id: "T-1".to_string(),
            state,
            agent_role: "role".to_string(),
            required_fields: Vec::new(),
            payload: Default::default(),
            next_stage_fields: Vec::new(),
            validation: ValidationStatus::default(),
            invalidation_report: None,
            history: History::new(),
            created_at: now,
            updated_at: now,
        }
    }

    // ── Chain primitives ──────────────────────────────────────────────────────

    /// Sealing three events produces a valid, gap-free chain.
    #[test]
    fn test_hash_chain_integrity() {
        let mut head = ChainHead::genesis();
        let chain: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|d| head.seal("run-1", &make_event(d)).unwrap())
            .collect();

        assert_eq!(chain[0].prev_hash, GENESIS_HASH);
        assert!(verify_chain(&chain));
        assert_eq!(ChainHead::after(&chain), head);
        assert_eq!(head.sequence, 3);
    }

    /// The hash commits to the scope as well as the event.
    #[test]
    fn test_hash_depends_on_scope() {
        let event = make_event("x");
        let a = hash_event("run-1", 0, &event, GENESIS_HASH).unwrap();
        let b = hash_event("run-2", 0, &event, GENESIS_HASH).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_event("run-1", 0, &event, GENESIS_HASH).unwrap());
    }

    /// Dropping an event from the middle breaks linkage.
    #[test]
    fn test_removed_event_detected() {
        let mut head = ChainHead::genesis();
        let mut chain: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|d| head.seal("run-1", &make_event(d)).unwrap())
            .collect();
        chain.remove(1);
        assert!(!verify_chain(&chain));
    }

    /// An empty chain is trivially valid.
    #[test]
    fn test_verify_empty() {
        assert!(verify_chain(&[]));
        assert_eq!(ChainHead::after(&[]), ChainHead::genesis());
    }

    // ── InMemoryStore snapshots ───────────────────────────────────────────────

    #[test]
    fn test_memory_snapshot_replaced_per_run() {
        let store = InMemoryStore::new();
        assert_eq!(store.latest_envelope("run-1").unwrap(), None);

        store.save_envelope(&make_envelope("run-1", Stage::FetchTicket)).unwrap();
        store.save_envelope(&make_envelope("run-2", Stage::FetchTicket)).unwrap();
        let latest = make_envelope("run-1", Stage::ScopeContext);
        store.save_envelope(&latest).unwrap();

        assert_eq!(store.latest_envelope("run-1").unwrap(), Some(latest));
        assert_eq!(store.run_ids().unwrap(), vec!["run-1", "run-2"]);
    }
}
