//! # interlock-core
//!
//! The deterministic state machine behind the Interlock ticket handshake.
//!
//! This crate provides:
//! - The three seam traits (`Gate`, `SnapshotStore`, `EventSink`)
//! - The stage registry and transition engine (`registry`)
//! - The `RunOrchestrator` that runs the submit pipeline in order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use interlock_core::{RunOrchestrator, traits::{Gate, SnapshotStore, EventSink}};
//!
//! let orchestrator = RunOrchestrator::new(Box::new(gate), store.clone(), store);
//! let envelope = orchestrator.begin_run("PROJ-42", None)?;
//! let response = orchestrator.submit(&filled_in_json)?;
//! ```

pub mod orchestrator;
pub mod registry;
pub mod traits;

pub use orchestrator::RunOrchestrator;
