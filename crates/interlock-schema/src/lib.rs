//! # interlock-schema
//!
//! Payload validation for the Interlock runtime.
//!
//! This crate provides [`gate::StagePayloadGate`], which implements the
//! [`interlock_core::traits::Gate`] trait. It checks a stage payload against
//! the closed schema registered for that stage in a [`catalog::SchemaCatalog`]
//! and reports every problem at once as sorted `ValidationIssue`s.
//!
//! The catalog can also render each schema as a JSON Schema document, which
//! is what the `interlock schema` command prints for agents.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use interlock_core::traits::Gate;
//! use interlock_schema::{gate::StagePayloadGate, samples::sample_payload};
//!
//! let gate = StagePayloadGate::default();
//! let verdict = gate.validate(Stage::FetchTicket, &sample_payload(Stage::FetchTicket));
//! assert!(verdict.is_pass());
//! ```

pub mod catalog;
pub mod gate;
pub mod samples;

pub use catalog::SchemaCatalog;
pub use gate::StagePayloadGate;
