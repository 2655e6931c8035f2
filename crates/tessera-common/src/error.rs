//! Error types for Tessera.

use thiserror::Error;

/// Result type alias using TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Errors that can occur in Tessera operations.
#[derive(Debug, Error)]
pub enum TesseraError {
    // I/O errors surfaced by the persistence collaborator
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TesseraError {
    /// Returns true if the error came from secondary storage.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, TesseraError::Io(_) | TesseraError::Serialization(_))
    }

    /// Returns true if the error reports a missing element.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TesseraError::NotFound(_))
    }
}
