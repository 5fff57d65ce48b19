//! Error types for the Interlock crates.
//!
//! Protocol outcomes (bad payloads, version mismatches, fail-closed runs) are
//! not errors; they travel inside `SubmitResponse`. `InterlockError` covers
//! invalid call arguments and failures of the collaborators around the core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterlockError {
    /// A caller-supplied argument was rejected. The call may be retried with
    /// a corrected value.
    #[error("invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    /// The snapshot store or event sink could not record a change.
    ///
    /// A transition that cannot be recorded is not reported as done.
    #[error("store write failed: {reason}")]
    StoreWriteFailed { reason: String },

    /// A stored snapshot or event log could not be read back.
    #[error("store read failed: {reason}")]
    StoreReadFailed { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl InterlockError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, InterlockError::InvalidArgument { .. })
    }
}

impl From<serde_json::Error> for InterlockError {
    fn from(e: serde_json::Error) -> Self {
        InterlockError::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the Interlock crates.
pub type InterlockResult<T> = Result<T, InterlockError>;
