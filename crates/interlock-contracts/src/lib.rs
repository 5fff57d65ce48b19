//! # interlock-contracts
//!
//! Shared types for the Interlock ticket handshake.
//!
//! All crates in the workspace import from here. No workflow logic lives in
//! this crate: only stage names, the envelope document, gate verdicts, run
//! events, and error types.

pub mod envelope;
pub mod error;
pub mod event;
pub mod gate;
pub mod response;
pub mod stage;
