//! Chat provider abstraction
//!
//! Provides a common interface for the backends a session can talk to:
//! the hosted generative-language API and the local intent webhook.

mod error;
mod gemini;
mod rasa;
mod registry;
mod types;

pub use error::{TransportError, TransportErrorKind};
pub use gemini::GeminiProvider;
pub use rasa::RasaProvider;
pub use registry::{ProviderConfig, ProviderRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Maximum attempts per logical request (initial try plus retries)
pub const MAX_ATTEMPTS: u32 = 3;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Common interface for chat providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Make a single completion request
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, TransportError>;

    /// Get the provider ID
    fn id(&self) -> &str;
}

/// Issue a request, retrying retryable failures with linear backoff.
///
/// Auth and bad-request failures are returned immediately; network,
/// rate-limit, and 5xx failures are tried up to `max_attempts` times.
pub async fn complete_with_retry(
    provider: &dyn ChatProvider,
    request: &ProviderRequest,
    max_attempts: u32,
) -> Result<ProviderReply, TransportError> {
    let mut attempt = 1;
    loop {
        match provider.complete(request).await {
            Ok(reply) => return Ok(reply),
            Err(e) if e.kind.is_retryable() && attempt < max_attempts => {
                let delay = e
                    .retry_after
                    .unwrap_or(RETRY_BASE_DELAY * attempt);
                tracing::warn!(
                    provider = %provider.id(),
                    attempt,
                    error = %e.message,
                    delay_ms = %delay.as_millis(),
                    "Provider request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Logging wrapper for chat providers
pub struct LoggingProvider {
    inner: Arc<dyn ChatProvider>,
    id: String,
}

impl LoggingProvider {
    pub fn new(inner: Arc<dyn ChatProvider>) -> Self {
        let id = inner.id().to_string();
        Self { inner, id }
    }
}

#[async_trait]
impl ChatProvider for LoggingProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    provider = %self.id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = reply.usage.input_tokens,
                    output_tokens = reply.usage.output_tokens,
                    "Provider request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Provider request failed"
                );
            }
        }

        result
    }

    fn id(&self) -> &str {
        &self.id
    }
}
