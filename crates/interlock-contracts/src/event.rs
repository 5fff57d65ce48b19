//! Run event records handed to the event sink.
//!
//! One `RunEvent` is emitted per pipeline side effect worth auditing. Unlike
//! the envelope's own history, events are written by the server only and
//! never round-trip through the agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A run was created.
    Begin,
    /// A well-formed envelope was received.
    Submit,
    /// The payload had fixable problems.
    Retry,
    /// The run was forced into `FailClosed`.
    FailClosed,
    /// The run advanced to its next stage.
    Transition,
    /// The submitted document could not be parsed as an envelope.
    Rejected,
}

/// A single event in a run's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Absent only for rejected documents whose run id could not be read.
    pub run_id: Option<String>,
    pub event_type: EventType,
    pub state: Option<Stage>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

impl RunEvent {
    /// Build an event stamped with the current time.
    pub fn now(
        run_id: Option<String>,
        event_type: EventType,
        state: Option<Stage>,
        details: Value,
    ) -> Self {
        Self {
            run_id,
            event_type,
            state,
            timestamp: Utc::now(),
            details,
        }
    }
}
