//! Delivery scanner
//!
//! Lists pending bundles in the staging directory, oldest first, so files
//! are ingested in delivery order and provenance ordering stays fair.

use crate::error::{IngestError, IngestResult};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Filename suffixes recognized as delivery bundles
const BUNDLE_SUFFIXES: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

/// List bundle paths in the staging directory, ascending by modification time
pub fn list_bundles(staging_dir: &Path) -> IngestResult<Vec<PathBuf>> {
    if !staging_dir.is_dir() {
        return Err(IngestError::StagingMissing(staging_dir.to_path_buf()));
    }

    let mut bundles: Vec<(SystemTime, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(staging_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !BUNDLE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            debug!(file = %name, "Skipping non-bundle file in staging area");
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        bundles.push((modified, path));
    }

    // Tie-break on path for a stable order within one mtime tick
    bundles.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    Ok(bundles.into_iter().map(|(_, path)| path).collect())
}

/// Bundle name without its archive suffix, used to prefix scratch workspaces
pub fn bundle_stem(bundle: &Path) -> String {
    let name = bundle
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    for suffix in BUNDLE_SUFFIXES {
        if let Some(stem) = name.strip_suffix(suffix) {
            return stem.to_string();
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn touch(path: &Path, age_secs: u64) {
        let file = File::create(path).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn test_missing_staging_dir() {
        let err = list_bundles(Path::new("/nonexistent/staging")).unwrap_err();
        assert!(matches!(err, IngestError::StagingMissing(_)));
    }

    #[test]
    fn test_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.tar"), 10);
        touch(&dir.path().join("a.tar"), 300);
        touch(&dir.path().join("c.tar.gz"), 100);

        let bundles = list_bundles(dir.path()).unwrap();
        let names: Vec<_> = bundles
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.tar", "c.tar.gz", "b.tar"]);
    }

    #[test]
    fn test_non_bundles_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("x.tar"), 5);
        touch(&dir.path().join("notes.txt"), 5);
        std::fs::create_dir(dir.path().join("sub.tar")).unwrap();

        let bundles = list_bundles(dir.path()).unwrap();
        assert_eq!(bundles.len(), 1);
    }

    #[test]
    fn test_bundle_stem() {
        assert_eq!(bundle_stem(Path::new("/in/obs_1.tar")), "obs_1");
        assert_eq!(bundle_stem(Path::new("obs_2.tar.gz")), "obs_2");
        assert_eq!(bundle_stem(Path::new("obs_3.tgz")), "obs_3");
    }
}
