//! Checksum utilities for file verification

use crate::error::{CommonError, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Default read block size for streaming checksum computation
pub const DEFAULT_BLOCK_SIZE: usize = 65536;

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Md5 => write!(f, "md5"),
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

impl std::str::FromStr for ChecksumAlgorithm {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            _ => Err(CommonError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Compute a checksum for a file, reading `block_size` bytes at a time
pub fn compute_file_checksum(
    path: impl AsRef<Path>,
    algorithm: ChecksumAlgorithm,
    block_size: usize,
) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file, algorithm, block_size)
}

/// Compute a checksum for any readable source
pub fn compute_checksum<R: Read>(
    reader: &mut R,
    algorithm: ChecksumAlgorithm,
    block_size: usize,
) -> Result<String> {
    match algorithm {
        ChecksumAlgorithm::Md5 => digest_reader::<Md5, R>(reader, block_size),
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader, block_size),
    }
}

fn digest_reader<D: Digest, R: Read>(reader: &mut R, block_size: usize) -> Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; block_size.max(1)];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an expected checksum (case-insensitive compare)
///
/// Returns the actual checksum on success so callers can record it.
pub fn verify_file_checksum(
    path: impl AsRef<Path>,
    expected: &str,
    algorithm: ChecksumAlgorithm,
    block_size: usize,
) -> Result<String> {
    let actual = compute_file_checksum(path.as_ref(), algorithm, block_size)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(actual)
    } else {
        Err(CommonError::ChecksumMismatch {
            file: path.as_ref().display().to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_compute_checksum_md5() {
        let data = b"Hello, world!";
        let mut cursor = Cursor::new(data);
        let checksum = compute_checksum(&mut cursor, ChecksumAlgorithm::Md5, 4).unwrap();
        assert_eq!(checksum, "6cd3556deb0da54bca060b4c39479839");
    }

    #[test]
    fn test_compute_checksum_sha256() {
        let data = b"hello world";
        let mut cursor = Cursor::new(data);
        let checksum =
            compute_checksum(&mut cursor, ChecksumAlgorithm::Sha256, DEFAULT_BLOCK_SIZE).unwrap();
        assert_eq!(
            checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_verify_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"test").unwrap();

        let lowercase = "098f6bcd4621d373cade4e832627b4f6";
        let uppercase = "098F6BCD4621D373CADE4E832627B4F6";

        assert!(
            verify_file_checksum(&path, lowercase, ChecksumAlgorithm::Md5, DEFAULT_BLOCK_SIZE)
                .is_ok()
        );
        assert!(
            verify_file_checksum(&path, uppercase, ChecksumAlgorithm::Md5, DEFAULT_BLOCK_SIZE)
                .is_ok()
        );
    }

    #[test]
    fn test_verify_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"test").unwrap();

        let err = verify_file_checksum(&path, "wrong", ChecksumAlgorithm::Md5, DEFAULT_BLOCK_SIZE)
            .unwrap_err();
        assert!(matches!(err, CommonError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(
            "md5".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Md5
        );
        assert_eq!(
            "SHA256".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Sha256
        );
        assert!("crc32".parse::<ChecksumAlgorithm>().is_err());
    }
}
