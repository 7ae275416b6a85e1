//! Transport error types
//!
//! Both providers normalize network and HTTP failures into one error type
//! classified for the retry loop.

use std::time::Duration;
use thiserror::Error;

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Network issues, timeouts - retryable
    Network,
    /// Rate limited (429) - retryable, honoring `Retry-After` when present
    RateLimit,
    /// Server error (5xx) - retryable
    ServerError,
    /// Authentication failed (401, 403) - not retryable
    Auth,
    /// Bad request (400) - not retryable
    InvalidRequest,
    /// Unknown error
    Unknown,
}

impl TransportErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}

/// Transport failure talking to a chat provider, with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Server-requested retry delay, consumed by the retry loop
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Classify an unsuccessful HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            400 => TransportErrorKind::InvalidRequest,
            401 | 403 => TransportErrorKind::Auth,
            429 => TransportErrorKind::RateLimit,
            500..=599 => TransportErrorKind::ServerError,
            _ => TransportErrorKind::Unknown,
        };
        Self::new(kind, message)
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unknown, message)
    }
}

/// Parse a `Retry-After` header in its delta-seconds form. Neither upstream
/// emits the HTTP-date form; it parses as `None` and the retry loop falls
/// back to its own backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
