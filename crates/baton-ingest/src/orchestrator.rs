//! Ingest orchestrator
//!
//! Runs one pass over the staging area: every pending bundle is extracted
//! into its own scratch workspace, verified, resolved, and registered. A
//! failing bundle is quarantined and the pass continues with the next one;
//! only quarantine failures (and panics) abort the run.

use crate::bundle::{self, ExtractedBundle};
use crate::config::IngestConfig;
use crate::digest::{DigestFile, DEFAULT_DELIMITER};
use crate::error::{IngestError, IngestResult};
use crate::manifest::Manifest;
use crate::quarantine::QuarantineHandler;
use crate::registration::{BundleContext, BundleState, ProcessIdentity, RegistrationManager};
use crate::registry::Registry;
use crate::resolver::PathResolver;
use crate::scanner;
use crate::transfer::TransferEngine;
use crate::verify;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Counters for one pass over the staging area
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub scanned: usize,
    pub ingested: usize,
    pub quarantined: usize,
    pub skipped: usize,
}

enum Outcome {
    Ingested,
    DryRun,
}

pub struct Orchestrator {
    config: IngestConfig,
    resolver: PathResolver,
    transfer: TransferEngine,
    registration: RegistrationManager,
    quarantine: QuarantineHandler,
    dry_run: bool,
    keep_scratch: bool,
}

impl Orchestrator {
    pub fn new(
        config: IngestConfig,
        identity: ProcessIdentity,
        dry_run: bool,
        keep_scratch: bool,
    ) -> Self {
        let resolver = PathResolver::new(&config);
        let transfer = TransferEngine::new(&config.transfer, config.checksum.block_size);
        let quarantine = QuarantineHandler::new(&config.quarantine_root);
        Self {
            config,
            resolver,
            transfer,
            registration: RegistrationManager::new(identity),
            quarantine,
            dry_run,
            keep_scratch,
        }
    }

    /// Process every pending bundle once
    pub async fn run(&self, registry: &mut dyn Registry) -> anyhow::Result<RunStats> {
        let bundles = scanner::list_bundles(&self.config.staging_dir)?;
        let mut stats = RunStats {
            scanned: bundles.len(),
            ..RunStats::default()
        };
        info!(
            count = bundles.len(),
            staging_dir = %self.config.staging_dir.display(),
            "Found {} bundles in delivery directory",
            bundles.len()
        );

        for bundle in bundles {
            // Another actor may have taken the bundle since the scan.
            if !bundle.exists() {
                warn!(bundle = %bundle.display(), "Bundle vanished before processing, skipping");
                stats.skipped += 1;
                continue;
            }

            let scratch = self.scratch_dir(&bundle);
            tokio::fs::create_dir_all(&scratch)
                .await
                .with_context(|| format!("creating scratch workspace {}", scratch.display()))?;

            let mut ctx = BundleContext::new(&bundle);
            let result = self.process_bundle(registry, &mut ctx, &scratch).await;

            match result {
                Ok(Outcome::Ingested) => stats.ingested += 1,
                Ok(Outcome::DryRun) => info!(bundle = %bundle.display(), "Dry run, bundle left in staging"),
                // Past commit the registration is durable and the payload is
                // archived; only the staging cleanup can have failed, and
                // quarantining now would delete a registered archive file.
                Err(err) if ctx.state == BundleState::Committed => {
                    warn!(
                        bundle = %bundle.display(),
                        error = %err,
                        "Ingested, but the delivery bundle could not be removed; remove it manually"
                    );
                    stats.ingested += 1;
                }
                Err(err) => {
                    error!(
                        bundle = %bundle.display(),
                        state = %ctx.state,
                        error = %err,
                        "Bundle rejected"
                    );
                    if self.dry_run {
                        info!(bundle = %bundle.display(), "Dry run, not quarantining");
                    } else {
                        self.reject(registry, &mut ctx, &err)
                            .await
                            .with_context(|| {
                                format!("quarantining bundle {}", bundle.display())
                            })?;
                        stats.quarantined += 1;
                    }
                }
            }

            if self.keep_scratch {
                info!(scratch = %scratch.display(), "Keeping scratch workspace");
            } else if let Err(err) = tokio::fs::remove_dir_all(&scratch).await {
                warn!(scratch = %scratch.display(), error = %err, "Could not remove scratch workspace");
            }
        }

        Ok(stats)
    }

    /// Per-bundle scratch workspace path, unique per attempt
    fn scratch_dir(&self, bundle: &Path) -> PathBuf {
        let stem = scanner::bundle_stem(bundle);
        self.config
            .scratch_root
            .join(format!("{stem}-{}", Uuid::new_v4().simple()))
    }

    /// Run one bundle through the pipeline up to (or through) registration
    async fn process_bundle(
        &self,
        registry: &mut dyn Registry,
        ctx: &mut BundleContext,
        scratch: &Path,
    ) -> IngestResult<Outcome> {
        let extracted = bundle::extract(&ctx.bundle_path, scratch)?;

        let digest = DigestFile::read(&extracted.digest_path, DEFAULT_DELIMITER)?;
        verify::verify_bundle(
            &extracted,
            &digest,
            self.config.checksum.algorithm,
            self.config.checksum.block_size,
        )?;
        ctx.state = BundleState::Verified;

        let manifest = Manifest::from_file(&extracted.manifest_path)?;
        ctx.manifest = Some(manifest.clone());

        check_manifest_consistency(&manifest, &extracted)?;
        verify::cross_check(&manifest, &digest, &extracted.payload_name())?;

        let resolved =
            self.resolver
                .resolve(&manifest.dataset_type, &extracted.payload_path, &manifest.filename)?;

        if self.dry_run {
            info!(
                bundle = %ctx.bundle_path.display(),
                relpath = %resolved.relative,
                "Verified, would archive at this path"
            );
            return Ok(Outcome::DryRun);
        }

        self.registration
            .register(
                registry,
                &self.transfer,
                ctx,
                &resolved,
                &extracted.payload_path,
                self.config.checksum.algorithm,
            )
            .await?;

        Ok(Outcome::Ingested)
    }

    /// Undo any partial archive write, then quarantine and record the bundle
    async fn reject(
        &self,
        registry: &mut dyn Registry,
        ctx: &mut BundleContext,
        cause: &IngestError,
    ) -> IngestResult<()> {
        if let Some(archived) = ctx.archived_path.take() {
            warn!(path = %archived.display(), "Removing archived payload of rejected bundle");
            tokio::fs::remove_file(&archived).await?;
        }

        self.quarantine
            .quarantine(registry, ctx, &cause.to_string())
            .await?;
        ctx.state = BundleState::Quarantined;
        Ok(())
    }
}

/// The manifest must describe the payload that actually arrived with it
fn check_manifest_consistency(
    manifest: &Manifest,
    extracted: &ExtractedBundle,
) -> IngestResult<()> {
    let payload_name = extracted.payload_name();
    if manifest.filename != payload_name {
        return Err(IngestError::Consistency(format!(
            "manifest names {} but bundle carries {payload_name}",
            manifest.filename
        )));
    }

    let actual_size = std::fs::metadata(&extracted.payload_path)?.len() as i64;
    if manifest.filesize != actual_size {
        return Err(IngestError::Consistency(format!(
            "manifest records {} bytes but payload has {actual_size}",
            manifest.filesize
        )));
    }

    Ok(())
}
