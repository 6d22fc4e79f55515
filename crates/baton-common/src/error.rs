//! Error types shared across Baton crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Shared error type for Baton utilities
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}: checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
