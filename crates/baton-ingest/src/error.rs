//! Ingest agent error types
//!
//! Every variant except panics (programming failures, which propagate and
//! abort the run) is caught per bundle: the bundle is quarantined with the
//! error's message as the recorded reason and processing continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Error taxonomy for the ingest workflow
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Staging directory does not exist: {0}")]
    StagingMissing(PathBuf),

    #[error("Bundle format error: {0}")]
    BundleFormat(String),

    #[error("Integrity error: {file}: checksums do not match (expected {expected}, got {actual})")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    #[error("No path template configured for dataset type: {0}")]
    UnknownDatasetType(String),

    #[error("Transfer failed after {attempts} attempts: {src} -> {dest}")]
    Transfer {
        attempts: u32,
        src: String,
        dest: String,
    },

    #[error("Duplicate file: {0}")]
    DuplicateFilename(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Digest error: {0}")]
    Digest(String),

    #[error("Registry error: {0}")]
    Registry(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] baton_common::CommonError),
}

impl IngestError {
    /// Whether this is the duplicate-filename business rejection rather
    /// than a fault
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestError::DuplicateFilename(_))
    }
}
