//! Error types for deck.

use thiserror::Error;

/// Main error type for deck operations.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot reach deck-server at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid server response: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

/// Result type alias for deck operations.
pub type CliResult<T> = Result<T, CliError>;
