//! Error types for natter-chat

use thiserror::Error;

/// Result type alias using natter-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a chat
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the model API layer
    #[error(transparent)]
    Ai(#[from] natter_ai::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The edited transcript could not be read back
    #[error("Transcript error: {0}")]
    Transcript(String),

    /// Starting a generation kept failing with transient errors
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: natter_ai::Error,
    },

    /// The response stream broke off mid-generation
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A generic chat error
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_message() {
        let e = Error::RetriesExhausted {
            attempts: 6,
            source: natter_ai::Error::Transient("overloaded".into()),
        };
        assert_eq!(
            e.to_string(),
            "Gave up after 6 attempts: Temporary failure: overloaded"
        );
    }
}
