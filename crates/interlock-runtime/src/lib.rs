//! # interlock-runtime
//!
//! Composition for the Interlock ticket handshake.
//!
//! - [`wiring`] turns an `InterlockConfig` into a `RunOrchestrator` backed
//!   by the standard stage gate and the configured store.
//! - [`walkthrough`] plays the agent side with sample payloads and drives
//!   one run through all seven working stages to `complete`.
//!
//! The end-to-end scenarios for the whole workspace live in this crate's
//! test module.

pub mod walkthrough;
pub mod wiring;

pub use walkthrough::{run_walkthrough, WalkthroughReport};
pub use wiring::{build_orchestrator, build_runtime, in_memory_runtime, Runtime, StoreHandle};

#[cfg(test)]
mod scenarios;
