//! API request and response types

use crate::summary::SummaryKind;
use serde::{Deserialize, Serialize};

/// Request to create a new session
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Provider ID; the registry default when omitted
    #[serde(default)]
    pub provider: Option<String>,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub text: String,
}

/// Response with a session snapshot
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: serde_json::Value,
}

/// Response with the assistant turn produced for a chat message
#[derive(Debug, Serialize)]
pub struct ChatMessageResponse {
    pub reply: serde_json::Value,
}

/// Response with a freshly generated structured summary
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub kind: SummaryKind,
    pub resource: serde_json::Value,
}

/// Response listing available providers
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<String>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
