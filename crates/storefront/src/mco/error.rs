//! Error types for the recommendation client.

use thiserror::Error;

/// Errors that can occur when talking to the recommendation service.
#[derive(Debug, Error)]
pub enum McoError {
    /// The service is not configured or its URL cannot be built.
    #[error("recommendation service unavailable: {0}")]
    Unavailable(String),

    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("recommendation service returned status {0}")]
    Status(u16),

    /// The reply could not be decoded into suggestions.
    #[error("parse error: {0}")]
    Parse(String),
}

impl McoError {
    /// Whether the failure is a malformed reply rather than an unreachable service.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
