//! Error types for deck-core.

use thiserror::Error;

use crate::command::Denial;

/// Result type alias using deck-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for deck operations
#[derive(Error, Debug)]
pub enum Error {
    // Command execution errors
    #[error("Command not specified")]
    EmptyCommand,

    #[error("Command '{command}' is forbidden: {reason}")]
    CommandDenied { command: String, reason: Denial },

    #[error("Command timed out after {secs}s: {command}")]
    CommandTimeout { command: String, secs: u64 },

    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn command: {cmd}\n{source}")]
    SpawnFailed {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an error from a spawn failure
    pub fn spawn_failed(cmd: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            cmd: cmd.into(),
            source,
        }
    }

    /// Check if this error is a policy denial
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::CommandDenied { .. })
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CommandTimeout { .. })
    }
}
