//! Bundle manifest parsing
//!
//! The manifest is the YAML record the producer wrote next to the payload.
//! It is parsed into a named-field struct at the ingestion boundary so
//! missing or malformed fields are rejected before any registry work starts.

use crate::error::{IngestError, IngestResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provenance and physical description of one delivered payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Delivery identifier grouping this payload's registration attempts
    pub uuid: String,

    /// Payload filename (no path)
    pub filename: String,

    /// Dataset type, selects the archive path template
    pub dataset_type: String,

    /// Checksum recorded by the producer
    pub checksum: String,

    /// Algorithm the producer used for `checksum`
    pub checksum_type: String,

    /// Payload size in bytes
    pub filesize: i64,

    /// Delivery time as epoch seconds
    pub timestamp: f64,

    /// Operator the producer ran as
    pub user: String,

    /// Free-form provenance message
    #[serde(alias = "prov_msg")]
    pub provenance_message: String,
}

impl Manifest {
    /// Read and validate a manifest file
    pub fn from_file(path: &Path) -> IngestResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse and validate manifest text
    pub fn parse(text: &str) -> IngestResult<Self> {
        let manifest: Manifest =
            serde_yaml::from_str(text).map_err(|e| IngestError::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> IngestResult<()> {
        for (field, value) in [
            ("uuid", &self.uuid),
            ("filename", &self.filename),
            ("dataset_type", &self.dataset_type),
            ("checksum", &self.checksum),
            ("checksum_type", &self.checksum_type),
        ] {
            if value.trim().is_empty() {
                return Err(IngestError::Manifest(format!("empty field: {field}")));
            }
        }

        if self.filesize < 0 {
            return Err(IngestError::Manifest(format!(
                "negative filesize: {}",
                self.filesize
            )));
        }

        if self.filename.contains('/') {
            return Err(IngestError::Manifest(format!(
                "filename must not contain a path: {}",
                self.filename
            )));
        }

        Ok(())
    }

    /// Delivery time, if the recorded epoch timestamp is representable
    pub fn delivery_time(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp.trunc() as i64;
        let nanos = (self.timestamp.fract() * 1_000_000_000.0) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}
