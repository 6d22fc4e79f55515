//! Transfer engine
//!
//! Moves a verified payload from the scratch workspace into the archive as
//! copy, re-checksum, then remove source. Transient copy or checksum
//! failures are retried with a fixed backoff; a partially written
//! destination is removed before each retry so a failed transfer never
//! leaves a corrupt file in the archive. The source stays in place until
//! the copied bytes have been independently verified.

use crate::config::TransferConfig;
use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use baton_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Copy primitive used by the engine
///
/// Abstracted so tests can inject failing or corrupting copiers.
#[async_trait]
pub trait PayloadCopier: Send + Sync {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<u64>;
}

/// Plain filesystem copier
pub struct FsCopier;

#[async_trait]
impl PayloadCopier for FsCopier {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<u64> {
        tokio::fs::copy(src, dest).await
    }
}

/// Retrying copy-verify-remove mover
pub struct TransferEngine {
    block_size: usize,
    max_attempts: u32,
    backoff: Duration,
    copier: Box<dyn PayloadCopier>,
}

impl TransferEngine {
    pub fn new(config: &TransferConfig, block_size: usize) -> Self {
        Self::with_copier(config, block_size, Box::new(FsCopier))
    }

    pub fn with_copier(
        config: &TransferConfig,
        block_size: usize,
        copier: Box<dyn PayloadCopier>,
    ) -> Self {
        Self {
            block_size,
            max_attempts: config.max_attempts,
            backoff: Duration::from_secs(config.backoff_secs),
            copier,
        }
    }

    /// Move `src` to `dest`, verifying the copy against `expected`
    ///
    /// Returns the number of attempts used. On exhaustion the source file is
    /// left intact and any partial destination has been removed.
    pub async fn move_into_archive(
        &self,
        src: &Path,
        dest: &Path,
        expected: &str,
        algorithm: ChecksumAlgorithm,
    ) -> IngestResult<u32> {
        if dest.exists() {
            return Err(IngestError::Consistency(format!(
                "destination already exists: {}",
                dest.display()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        for attempt in 1..=self.max_attempts {
            match self.try_once(src, dest, expected, algorithm).await {
                Ok(()) => {
                    tokio::fs::remove_file(src).await?;
                    info!(
                        src = %src.display(),
                        dest = %dest.display(),
                        attempt,
                        "Moved payload into archive"
                    );
                    return Ok(attempt);
                }
                Err(err) => {
                    warn!(
                        src = %src.display(),
                        dest = %dest.display(),
                        attempt,
                        error = %err,
                        "Transfer attempt failed"
                    );
                    remove_partial(dest).await;
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        Err(IngestError::Transfer {
            attempts: self.max_attempts,
            src: src.display().to_string(),
            dest: dest.display().to_string(),
        })
    }

    /// One copy-and-verify attempt
    async fn try_once(
        &self,
        src: &Path,
        dest: &Path,
        expected: &str,
        algorithm: ChecksumAlgorithm,
    ) -> IngestResult<()> {
        self.copier.copy(src, dest).await?;

        let actual = compute_file_checksum(dest, algorithm, self.block_size)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(IngestError::Integrity {
                file: dest.display().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}

/// Remove a partial destination, tolerating its absence
async fn remove_partial(dest: &Path) {
    if let Err(err) = tokio::fs::remove_file(dest).await {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(dest = %dest.display(), error = %err, "Could not remove partial destination");
        }
    }
}
