//! Error types for natter-ai

use thiserror::Error;

/// Result type alias using natter-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a language-model API
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// The service asked us to try again later
    #[error("Temporary failure: {0}")]
    Transient(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let (error_type, message) = parse_error_body(body)
            .unwrap_or_else(|| (format!("http_{}", status), body.trim().to_string()));

        match status {
            401 | 403 => Error::InvalidApiKey,
            429 => Error::RateLimited { retry_after: None },
            500..=599 => Error::api("server_error", message),
            _ => Error::Api {
                error_type,
                message,
            },
        }
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Sse(_) | Error::Transient(_) => {
                true
            }
            Error::Api {
                error_type,
                message,
            } => {
                let et = error_type.to_lowercase();
                let msg = message.to_lowercase();
                et == "server_error"
                    || et.contains("rate_limit")
                    || et.contains("overloaded")
                    || msg.contains("rate limit")
                    || msg.contains("overloaded")
                    || msg.contains("too many requests")
                    || msg.contains("try again")
            }
            _ => false,
        }
    }
}

/// Pull `error.type` and `error.message` out of an OpenAI-style error body.
fn parse_error_body(body: &str) -> Option<(String, String)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = error.get("message")?.as_str()?.to_string();
    let error_type = error
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("api_error")
        .to_string();
    Some((error_type, message))
}
