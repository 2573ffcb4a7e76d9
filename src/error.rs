//! Error types for the studio core and its collaborators.

use std::time::Duration;

/// Maximum length of an API error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Errors that can occur while talking to collaborators or persisting state.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay, if any.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response was well-formed JSON but not the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[cfg(feature = "gemini")]
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key-value store failure that is not plain I/O.
    #[error("storage error: {0}")]
    Storage(String),

    /// Conversation service failure.
    #[error("conversation failed: {0}")]
    Conversation(String),
}

impl StudioError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            #[cfg(feature = "gemini")]
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            #[cfg(feature = "gemini")]
            Self::Network(_) => Some(Duration::from_secs(2)),
            Self::Api { status, .. } if *status >= 500 => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Redacts anything that looks like a Google API key and truncates long bodies.
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: String = text
        .split_inclusive(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .map(|token| {
            let word = token.trim_end_matches(|c: char| {
                !(c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
            if word.starts_with("AIza") && word.len() >= 30 {
                token.replacen(word, "[REDACTED]", 1)
            } else {
                token.to_string()
            }
        })
        .collect();

    let trimmed = redacted.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Reads a `Retry-After` header expressed in whole seconds.
#[cfg(feature = "gemini")]
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
