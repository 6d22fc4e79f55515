//! Quarantine handler
//!
//! Rejected bundles are moved out of staging into a year/month bucket under
//! the rejection area and recorded in the bad-file ledger. Any registry rows
//! staged for the bundle are rolled back first; the ledger row itself
//! commits independently so it survives the rollback.

use crate::error::IngestResult;
use crate::registration::BundleContext;
use crate::registry::{BadFileRecord, Registry};
use chrono::{DateTime, Datelike, Local, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct QuarantineHandler {
    quarantine_root: PathBuf,
}

impl QuarantineHandler {
    pub fn new(quarantine_root: &Path) -> Self {
        Self {
            quarantine_root: quarantine_root.to_path_buf(),
        }
    }

    /// Move a rejected bundle into quarantine and record it
    ///
    /// Returns the path the bundle now lives at. Errors here are fatal to
    /// the run: a bundle that can be neither ingested nor quarantined must
    /// not be silently skipped.
    pub async fn quarantine(
        &self,
        registry: &mut dyn Registry,
        ctx: &BundleContext,
        reason: &str,
    ) -> IngestResult<PathBuf> {
        registry.rollback().await?;

        let bundle_name = ctx
            .bundle_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let now = Local::now();
        let bucket = format!("{:04}/{:02}", now.year(), now.month());
        let bucket_dir = self.quarantine_root.join(&bucket);
        tokio::fs::create_dir_all(&bucket_dir).await?;

        let dest = bucket_dir.join(&bundle_name);
        if dest.exists() {
            warn!(dest = %dest.display(), "Replacing stale quarantined bundle of the same name");
            tokio::fs::remove_file(&dest).await?;
        }

        // Capture size and mtime before the move invalidates the source path.
        let meta = tokio::fs::metadata(&ctx.bundle_path).await?;
        let disk_usage = meta.len() as i64;
        let mtime: DateTime<Utc> = meta.modified()?.into();

        move_file(&ctx.bundle_path, &dest).await?;

        let manifest = ctx.manifest.as_ref();
        let delivery_time = manifest
            .and_then(|m| m.delivery_time())
            .unwrap_or(mtime);

        registry
            .record_bad_file(&BadFileRecord {
                bundle_name: bundle_name.clone(),
                quarantine_relpath: format!("{bucket}/{bundle_name}"),
                disk_usage,
                reason: reason.to_string(),
                delivery_time,
                rejected_time: Utc::now(),
                filename: manifest.map(|m| m.filename.clone()),
                dataset_type: manifest.map(|m| m.dataset_type.clone()),
                filesize: manifest.map(|m| m.filesize),
                checksum: manifest.map(|m| m.checksum.clone()),
                checksum_type: manifest.map(|m| m.checksum_type.clone()),
                process_id: ctx.process_id,
            })
            .await?;

        info!(
            bundle = %bundle_name,
            dest = %dest.display(),
            reason = %reason,
            "Quarantined bundle"
        );
        Ok(dest)
    }
}

/// Rename, falling back to copy and remove across filesystems
async fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(src, dest).await?;
            tokio::fs::remove_file(src).await
        }
    }
}
