//! Integrity verification
//!
//! Checks every extracted file against the digest shipped in the bundle,
//! then cross-checks the manifest's recorded payload checksum against the
//! digest's. The digest and the manifest are authored independently, so a
//! disagreement between them is a consistency anomaly, not an ordinary
//! data rejection.

use crate::bundle::ExtractedBundle;
use crate::digest::DigestFile;
use crate::error::{IngestError, IngestResult};
use crate::manifest::Manifest;
use baton_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
use std::path::Path;
use tracing::{debug, info};

/// Verify the manifest file and the payload against the digest
pub fn verify_bundle(
    bundle: &ExtractedBundle,
    digest: &DigestFile,
    algorithm: ChecksumAlgorithm,
    block_size: usize,
) -> IngestResult<()> {
    integrity_check(
        &bundle.manifest_path,
        digest.expected(&bundle.manifest_name())?,
        algorithm,
        block_size,
    )?;
    integrity_check(
        &bundle.payload_path,
        digest.expected(&bundle.payload_name())?,
        algorithm,
        block_size,
    )?;
    Ok(())
}

/// Compare one file's actual checksum to the digest's recorded value
fn integrity_check(
    path: &Path,
    expected: &str,
    algorithm: ChecksumAlgorithm,
    block_size: usize,
) -> IngestResult<()> {
    info!(file = %path.display(), "Integrity checking file");

    let actual = compute_file_checksum(path, algorithm, block_size)?;
    debug!(expected = %expected, actual = %actual, "Computed checksum");

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(IngestError::Integrity {
            file: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    info!(file = %path.display(), "Passed integrity check");
    Ok(())
}

/// Cross-check the manifest's recorded payload checksum against the digest's
///
/// Both values describe the same payload but were written separately by the
/// producer; they must always agree.
pub fn cross_check(
    manifest: &Manifest,
    digest: &DigestFile,
    payload_name: &str,
) -> IngestResult<()> {
    let recorded = digest.expected(payload_name)?;
    if !manifest.checksum.eq_ignore_ascii_case(recorded) {
        return Err(IngestError::Consistency(format!(
            "manifest and digest checksums do not match for {payload_name}"
        )));
    }
    Ok(())
}
