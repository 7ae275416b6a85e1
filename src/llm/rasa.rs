//! Local intent-webhook provider (Rasa REST channel)
//!
//! POSTs `{sender, message}` to a Rasa-style webhook and consumes the first
//! reply object of the returned array. The webhook keeps its own dialogue
//! state per sender, so only the latest user turn is forwarded; the system
//! prompt and prior history are ignored.

use super::error::parse_retry_after;
use super::types::{ProviderReply, ProviderRequest, Role, TokenUsage};
use super::{ChatProvider, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_WEBHOOK_URL: &str = "http://localhost:5005/webhooks/rest/webhook";

/// Rasa REST webhook provider
pub struct RasaProvider {
    client: Client,
    url: String,
    sender: String,
}

impl RasaProvider {
    pub fn new(url: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            sender: "user".to_string(),
        })
    }

    fn latest_user_text(request: &ProviderRequest) -> Result<&str, TransportError> {
        request
            .history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.text.as_str())
            .ok_or_else(|| TransportError::invalid_request("No user turn to forward"))
    }
}

#[async_trait]
impl ChatProvider for RasaProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, TransportError> {
        let message = Self::latest_user_text(request)?;

        let response = self
            .client
            .post(&self.url)
            .json(&RasaRequest {
                sender: &self.sender,
                message,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    TransportError::network(format!("Connection failed: {e}"))
                } else {
                    TransportError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(
                TransportError::from_status(status.as_u16(), format!("HTTP {status}: {body}"))
                    .with_retry_after(retry_after),
            );
        }

        let replies: Vec<RasaReply> = response
            .json()
            .await
            .map_err(|e| TransportError::unknown(format!("Failed to parse response: {e}")))?;

        let text = replies
            .into_iter()
            .next()
            .and_then(|reply| reply.text)
            .ok_or_else(|| TransportError::unknown("Webhook returned no reply text"))?;

        Ok(ProviderReply {
            text,
            usage: TokenUsage::default(),
        })
    }

    fn id(&self) -> &str {
        "rasa"
    }
}

#[derive(Debug, Serialize)]
struct RasaRequest<'a> {
    sender: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct RasaReply {
    text: Option<String>,
}
