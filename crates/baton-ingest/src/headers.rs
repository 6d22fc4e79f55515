//! Payload metadata headers
//!
//! Payloads carry a leading text header block of `KEY = value` lines,
//! terminated by an `END` line or the first line that is not a header.
//! Only this block is read; the rest of the payload is opaque to the agent.

use crate::error::IngestResult;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Maximum number of bytes inspected for the header block
const HEADER_SCAN_LIMIT: u64 = 64 * 1024;

/// Named header values read from a payload
#[derive(Debug, Clone, Default)]
pub struct PayloadHeaders {
    values: HashMap<String, String>,
}

impl PayloadHeaders {
    /// Read the header block of a payload file
    ///
    /// The payload body may be binary, so the scanned prefix is decoded
    /// lossily; parsing stops at the first non-header line anyway.
    pub fn read(path: &Path) -> IngestResult<Self> {
        let mut prefix = Vec::new();
        std::fs::File::open(path)?
            .take(HEADER_SCAN_LIMIT)
            .read_to_end(&mut prefix)?;
        Ok(Self::parse(&String::from_utf8_lossy(&prefix)))
    }

    /// Parse header lines from the start of the given text
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line == "END" {
                break;
            }

            let Some((key, value)) = line.split_once('=') else {
                break;
            };

            let key = key.trim().to_lowercase();
            if key.is_empty() || key.contains(char::is_whitespace) {
                break;
            }

            let value = line_value(value);
            values.insert(key, value.to_string());
        }

        Self { values }
    }

    /// Look up a header value by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Trim a raw header value, stripping one level of surrounding quotes
fn line_value(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| {
            trimmed
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
        })
        .map(str::trim)
        .unwrap_or(trimmed)
}
