//! Wire types shared by the relay and its client.

use serde::{Deserialize, Serialize};

/// Path of the identification endpoint.
pub const IDENTIFY_PATH: &str = "/api/identifyPlant";

/// Successful relay reply: the model's raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    /// Unparsed model output.
    pub response: String,
}

/// Error body used for every non-200 relay reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}
