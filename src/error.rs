// src/error.rs
// Failure taxonomy for calls to unreliable external services. The retry
// policy keys off `is_retryable`, so every collaborator maps its transport
// and HTTP failures into this enum instead of string-matching later.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("server error (status {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("client error (status {status}): {detail}")]
    Client { status: u16, detail: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ExternalError {
    /// Rate limits, timeouts, 5xx and transport hiccups are worth retrying;
    /// client errors (bad input, auth rejection) and malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExternalError::RateLimited(_)
                | ExternalError::Timeout(_)
                | ExternalError::Server { .. }
                | ExternalError::Transport(_)
        )
    }

    /// Classify an HTTP status line from an external API.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            429 => ExternalError::RateLimited(detail),
            408 => ExternalError::Timeout(detail),
            s if s >= 500 => ExternalError::Server { status: s, detail },
            s => ExternalError::Client { status: s, detail },
        }
    }
}

impl From<reqwest::Error> for ExternalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExternalError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            ExternalError::from_status(status.as_u16(), err.to_string())
        } else {
            ExternalError::Transport(err.to_string())
        }
    }
}
