//! Bundle extraction
//!
//! Unpacks one delivery bundle into a scratch workspace and classifies the
//! extracted files. The original bundle is only read, never modified; all
//! downstream steps work on explicit workspace paths.

use crate::error::{IngestError, IngestResult};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix identifying the manifest file inside a bundle
const MANIFEST_SUFFIX: &str = ".manifest";

/// Suffix identifying the digest file inside a bundle
const DIGEST_SUFFIX: &str = ".digest";

/// One unpacked bundle: exactly one payload, one manifest, one digest
#[derive(Debug)]
pub struct ExtractedBundle {
    /// Scratch workspace the files were extracted into
    pub workspace: PathBuf,
    pub payload_path: PathBuf,
    pub manifest_path: PathBuf,
    pub digest_path: PathBuf,
}

impl ExtractedBundle {
    /// Extracted payload filename (no path)
    pub fn payload_name(&self) -> String {
        self.payload_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Extracted manifest filename (no path)
    pub fn manifest_name(&self) -> String {
        self.manifest_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Unpack a bundle into `workspace` and classify its contents
pub fn extract(bundle: &Path, workspace: &Path) -> IngestResult<ExtractedBundle> {
    unpack(bundle, workspace)?;
    classify(workspace)
}

/// Unpack the archive, gzip-decoding when the suffix says so
fn unpack(bundle: &Path, workspace: &Path) -> IngestResult<()> {
    let name = bundle.to_string_lossy();
    let file = File::open(bundle)?;

    if name.ends_with(".gz") || name.ends_with(".tgz") {
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.unpack(workspace)?;
    } else {
        let mut archive = tar::Archive::new(file);
        archive.unpack(workspace)?;
    }

    debug!(bundle = %bundle.display(), workspace = %workspace.display(), "Unpacked bundle");
    Ok(())
}

/// Classify the extracted files into payload / manifest / digest
fn classify(workspace: &Path) -> IngestResult<ExtractedBundle> {
    let mut payload = None;
    let mut manifest = None;
    let mut digest = None;
    let mut found = 0usize;

    for entry in std::fs::read_dir(workspace)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            return Err(IngestError::BundleFormat(format!(
                "unexpected non-file entry: {}",
                entry.file_name().to_string_lossy()
            )));
        }

        found += 1;
        let name = entry.file_name().to_string_lossy().to_string();
        let slot = if name.ends_with(MANIFEST_SUFFIX) {
            &mut manifest
        } else if name.ends_with(DIGEST_SUFFIX) {
            &mut digest
        } else {
            &mut payload
        };

        if slot.replace(entry.path()).is_some() {
            return Err(IngestError::BundleFormat(format!(
                "more than one file of the same role, second was {name}"
            )));
        }
    }

    if found != 3 {
        return Err(IngestError::BundleFormat(format!(
            "expected payload, manifest and digest, found {found} files"
        )));
    }

    match (payload, manifest, digest) {
        (Some(payload_path), Some(manifest_path), Some(digest_path)) => Ok(ExtractedBundle {
            workspace: workspace.to_path_buf(),
            payload_path,
            manifest_path,
            digest_path,
        }),
        _ => Err(IngestError::BundleFormat(
            "missing payload, manifest or digest".to_string(),
        )),
    }
}
