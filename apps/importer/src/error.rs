//! Error types for the importer.

use thiserror::Error;

/// Failures talking to the flashcard application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Duplicate note: {0}")]
    Duplicate(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SinkError {
    /// Classify an error message returned by the remote API.
    pub fn from_remote(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains("duplicate") {
            Self::Duplicate(message)
        } else {
            Self::Remote(message)
        }
    }

    /// Whether the remote could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}

/// Startup configuration problems. These are the only fatal errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Unknown content kind: {0}")]
    UnknownKind(String),

    #[error("Invalid AnkiConnect URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Backoff cap {max_ms}ms is below the base delay {base_ms}ms")]
    BackoffRange { base_ms: u64, max_ms: u64 },

    #[error("Note model not found: {0}")]
    MissingModel(String),

    #[error("Note model {model} has no field {field}")]
    MissingField { model: String, field: String },

    #[error("Pre-flight check failed: {0}")]
    Preflight(String),
}
