//! Registration manager
//!
//! Drives one verified bundle through provenance registration: resolve or
//! create its process row, reject duplicate filenames, create the dataset,
//! move the payload into the archive, stage the datastore entry, and commit.
//! The delivery bundle itself is deleted only after the commit succeeds, so
//! a crash anywhere earlier leaves the bundle in staging for a rerun.

use crate::error::{IngestError, IngestResult};
use crate::manifest::Manifest;
use crate::registry::{DatastoreEntry, NewProcess, Registry};
use crate::resolver::ResolvedPath;
use crate::transfer::TransferEngine;
use baton_common::checksum::ChecksumAlgorithm;
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stages a bundle passes through while being ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    Extracted,
    Verified,
    ProcessResolved,
    DuplicateRejected,
    DatasetCreated,
    Stored,
    Committed,
    Quarantined,
}

impl BundleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleState::Extracted => "extracted",
            BundleState::Verified => "verified",
            BundleState::ProcessResolved => "process_resolved",
            BundleState::DuplicateRejected => "duplicate_rejected",
            BundleState::DatasetCreated => "dataset_created",
            BundleState::Stored => "stored",
            BundleState::Committed => "committed",
            BundleState::Quarantined => "quarantined",
        }
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything learned about a bundle so far
///
/// Carried across the pipeline so the quarantine path knows what was already
/// done (a stored payload must be pulled back out of the archive, a resolved
/// process id is attached to the bad-file record).
#[derive(Debug)]
pub struct BundleContext {
    pub bundle_path: PathBuf,
    pub state: BundleState,
    pub manifest: Option<Manifest>,
    pub process_id: Option<i64>,
    pub archived_path: Option<PathBuf>,
}

impl BundleContext {
    pub fn new(bundle_path: &Path) -> Self {
        Self {
            bundle_path: bundle_path.to_path_buf(),
            state: BundleState::Extracted,
            manifest: None,
            process_id: None,
            archived_path: None,
        }
    }
}

/// Identity stamped onto process rows created by this run
///
/// The operator and provenance message come from the manifest; these fields
/// describe the agent itself.
#[derive(Debug, Clone)]
pub struct ProcessIdentity {
    pub exec_name: String,
    pub exec_host: String,
}

/// Registers verified bundles in the provenance registry
pub struct RegistrationManager {
    identity: ProcessIdentity,
}

impl RegistrationManager {
    pub fn new(identity: ProcessIdentity) -> Self {
        Self { identity }
    }

    /// Register one verified bundle and move its payload into the archive
    ///
    /// `ctx.manifest` must be populated. On success the context reaches
    /// [`BundleState::Committed`] and the bundle file is gone from staging.
    pub async fn register(
        &self,
        registry: &mut dyn Registry,
        transfer: &TransferEngine,
        ctx: &mut BundleContext,
        resolved: &ResolvedPath,
        payload: &Path,
        algorithm: ChecksumAlgorithm,
    ) -> IngestResult<()> {
        let manifest = ctx
            .manifest
            .clone()
            .ok_or_else(|| IngestError::Manifest("manifest not parsed".to_string()))?;

        let process_id = self.resolve_process(registry, &manifest).await?;
        ctx.process_id = Some(process_id);
        ctx.state = BundleState::ProcessResolved;

        if registry.filename_exists(&manifest.filename).await? {
            ctx.state = BundleState::DuplicateRejected;
            return Err(IngestError::DuplicateFilename(manifest.filename.clone()));
        }

        let dataset_id = registry
            .create_dataset(process_id, &manifest.dataset_type)
            .await?;
        ctx.state = BundleState::DatasetCreated;
        debug!(dataset_id, dataset_type = %manifest.dataset_type, "Created dataset");

        let attempts = transfer
            .move_into_archive(payload, &resolved.destination, &manifest.checksum, algorithm)
            .await?;
        ctx.archived_path = Some(resolved.destination.clone());
        ctx.state = BundleState::Stored;
        if attempts > 1 {
            info!(attempts, file = %manifest.filename, "Transfer needed retries");
        }

        registry
            .create_datastore_entry(&DatastoreEntry {
                dataset_id,
                filename: manifest.filename.clone(),
                relpath: resolved.relative.clone(),
                filesize: manifest.filesize,
                checksum: manifest.checksum.clone(),
                checksum_type: manifest.checksum_type.clone(),
            })
            .await?;

        registry.finish_process(process_id).await?;
        registry.commit().await?;
        ctx.state = BundleState::Committed;

        // Only now is it safe to drop the delivery bundle.
        tokio::fs::remove_file(&ctx.bundle_path).await?;

        info!(
            file = %manifest.filename,
            relpath = %resolved.relative,
            process_id,
            "Registered and archived payload"
        );
        Ok(())
    }

    /// Find the process row for this delivery, creating it on first sight
    async fn resolve_process(
        &self,
        registry: &mut dyn Registry,
        manifest: &Manifest,
    ) -> IngestResult<i64> {
        if let Some(process_id) = registry.lookup_process(&manifest.uuid).await? {
            info!(process_id, uuid = %manifest.uuid, "Reusing existing process row");
            return Ok(process_id);
        }

        registry
            .create_process(&NewProcess {
                uuid: manifest.uuid.clone(),
                exec_name: self.identity.exec_name.clone(),
                exec_host: self.identity.exec_host.clone(),
                // the delivery time, when the producer recorded one
                start_time: manifest.delivery_time().unwrap_or_else(Utc::now),
                username: manifest.user.clone(),
                provenance_message: manifest.provenance_message.clone(),
            })
            .await
    }
}
