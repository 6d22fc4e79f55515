//! Checksum digest file parsing
//!
//! The digest is a plain-text file shipped inside every bundle, one line per
//! covered file in `<checksum><delim><filename>` form (md5sum-like, default
//! delimiter TAB). It is authored independently of the manifest.

use crate::error::{IngestError, IngestResult};
use std::collections::HashMap;
use std::path::Path;

/// Default field delimiter in digest lines
pub const DEFAULT_DELIMITER: char = '\t';

/// Expected checksums keyed by extracted filename
#[derive(Debug, Clone)]
pub struct DigestFile {
    entries: HashMap<String, String>,
}

impl DigestFile {
    /// Read and parse a digest file
    pub fn read(path: &Path, delimiter: char) -> IngestResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, delimiter)
    }

    /// Parse digest text
    pub fn parse(text: &str, delimiter: char) -> IngestResult<Self> {
        let mut entries = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (checksum, filename) = line.split_once(delimiter).ok_or_else(|| {
                IngestError::Digest(format!("malformed digest line: {line}"))
            })?;

            let checksum = checksum.trim();
            let filename = filename.trim();
            if checksum.is_empty() || filename.is_empty() {
                return Err(IngestError::Digest(format!(
                    "malformed digest line: {line}"
                )));
            }

            entries.insert(filename.to_string(), checksum.to_string());
        }

        if entries.is_empty() {
            return Err(IngestError::Digest("digest file is empty".to_string()));
        }

        Ok(Self { entries })
    }

    /// Expected checksum for a covered file
    pub fn expected(&self, filename: &str) -> IngestResult<&str> {
        self.entries
            .get(filename)
            .map(String::as_str)
            .ok_or_else(|| IngestError::Digest(format!("no digest entry for {filename}")))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
