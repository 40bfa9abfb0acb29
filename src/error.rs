//! Error types for Chronicle

use thiserror::Error;

/// Main error type for the memory store
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A caller-supplied value was rejected before any state was touched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A snapshot failed structural or semantic checks
    #[error("Validation error: {0}")]
    Validation(String),

    /// Memory not found
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MemoryError>;
