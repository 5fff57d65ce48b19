//! The response returned to the calling agent for `begin` and `submit`.

use serde::{Deserialize, Serialize};

use crate::{envelope::TicketEnvelope, gate::GateResult, stage::Stage};

/// Standard response shape for every binding operation.
///
/// `updated_envelope` and `serialized_envelope` are absent only when the
/// submitted document could not be read at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub updated_envelope: Option<TicketEnvelope>,
    /// Pretty-printed JSON of `updated_envelope`, ready to save and resubmit.
    pub serialized_envelope: Option<String>,
    /// Whether the agent should keep working this run.
    #[serde(rename = "continue")]
    pub proceed: bool,
    pub reason: String,
    pub next_role: String,
    pub next_state: Option<Stage>,
    pub gate_result: Option<GateResult>,
}
