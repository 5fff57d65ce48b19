//! From configuration to a ready orchestrator.
//!
//! The orchestrator only sees the `SnapshotStore` and `EventSink` traits.
//! `Runtime` additionally keeps a typed handle on the concrete store so
//! callers can inspect and verify event chains.

use std::sync::Arc;

use tracing::info;

use interlock_audit::{EventLog, FsStore, InMemoryStore};
use interlock_config::{InterlockConfig, StorageBackend};
use interlock_contracts::error::InterlockResult;
use interlock_core::{
    traits::{EventSink, SnapshotStore},
    RunOrchestrator,
};
use interlock_schema::StagePayloadGate;

/// The concrete store behind a `Runtime`.
#[derive(Clone)]
pub enum StoreHandle {
    Memory(Arc<InMemoryStore>),
    Filesystem(Arc<FsStore>),
}

impl StoreHandle {
    /// Open the store `config.storage` describes.
    pub fn open(config: &InterlockConfig) -> InterlockResult<Self> {
        Ok(match config.storage.backend {
            StorageBackend::Memory => StoreHandle::Memory(Arc::new(InMemoryStore::new())),
            StorageBackend::Filesystem => {
                StoreHandle::Filesystem(Arc::new(FsStore::open(&config.storage.dir)?))
            }
        })
    }

    pub fn snapshots(&self) -> Arc<dyn SnapshotStore> {
        match self {
            StoreHandle::Memory(store) => store.clone(),
            StoreHandle::Filesystem(store) => store.clone(),
        }
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        match self {
            StoreHandle::Memory(store) => store.clone(),
            StoreHandle::Filesystem(store) => store.clone(),
        }
    }

    /// Whether `scope`'s event chain is intact.
    pub fn verify_scope(&self, scope: &str) -> InterlockResult<bool> {
        match self {
            StoreHandle::Memory(store) => store.verify_integrity(scope),
            StoreHandle::Filesystem(store) => store.verify_scope(scope),
        }
    }

    pub fn export_log(&self, scope: &str) -> InterlockResult<EventLog> {
        match self {
            StoreHandle::Memory(store) => store.export_log(scope),
            StoreHandle::Filesystem(store) => store.export_log(scope),
        }
    }
}

/// A configured orchestrator together with its store.
pub struct Runtime {
    pub orchestrator: RunOrchestrator,
    pub store: StoreHandle,
}

/// Build an orchestrator over the standard stage schemas, wired to `store`.
pub fn build_orchestrator(config: &InterlockConfig, store: &StoreHandle) -> RunOrchestrator {
    RunOrchestrator::new(
        Box::new(StagePayloadGate::default()),
        store.snapshots(),
        store.events(),
    )
    .with_schema_version(config.schema_version.clone())
    .with_run_id_prefix(config.run_id_prefix.clone())
}

/// Validate `config`, open its store, and build the orchestrator.
pub fn build_runtime(config: &InterlockConfig) -> InterlockResult<Runtime> {
    config.validate()?;
    let store = StoreHandle::open(config)?;
    let orchestrator = build_orchestrator(config, &store);
    info!(
        backend = ?config.storage.backend,
        schema_version = %config.schema_version,
        "runtime ready"
    );
    Ok(Runtime {
        orchestrator,
        store,
    })
}

/// A runtime over a fresh in-memory store, with otherwise default settings.
pub fn in_memory_runtime() -> Runtime {
    let store = StoreHandle::Memory(Arc::new(InMemoryStore::new()));
    let orchestrator = build_orchestrator(&InterlockConfig::default(), &store);
    Runtime {
        orchestrator,
        store,
    }
}
