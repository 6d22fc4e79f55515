//! Archive destination path resolution
//!
//! Each dataset type has a relative-path template with `{name}` placeholders
//! (a `{name:format}` spelling is tolerated, the format part is ignored).
//! Placeholders resolve either directly from the payload's headers or via a
//! named derivation:
//!
//! - `camera`: maps the raw `INSTRUME` header value to a configured short code
//! - `obsnight`: observing-night bucket (`YYYYMMDD`); taken from the
//!   `OBS-NIGHT` header when present, otherwise derived from `DATE-OBS`,
//!   attributing times before the cutoff hour to the previous calendar day

use crate::config::{IngestConfig, ResolverConfig};
use crate::error::{IngestError, IngestResult};
use crate::headers::PayloadHeaders;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved archive location for one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Relative path under the archive root, recorded in the registry
    pub relative: String,

    /// Absolute destination including the payload basename
    pub destination: PathBuf,
}

/// Computes archive destinations from dataset type and payload metadata
#[derive(Debug, Clone)]
pub struct PathResolver {
    archive_root: PathBuf,
    templates: HashMap<String, String>,
    config: ResolverConfig,
}

impl PathResolver {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            archive_root: config.archive_root.clone(),
            templates: config.path_templates.clone(),
            config: config.resolver.clone(),
        }
    }

    /// Resolve the destination for a payload
    ///
    /// `filename` is the manifest-recorded payload name used as the
    /// destination basename; `payload` is the extracted file whose headers
    /// feed the template.
    pub fn resolve(
        &self,
        dataset_type: &str,
        payload: &Path,
        filename: &str,
    ) -> IngestResult<ResolvedPath> {
        let template = self
            .templates
            .get(dataset_type)
            .ok_or_else(|| IngestError::UnknownDatasetType(dataset_type.to_string()))?;

        let headers = PayloadHeaders::read(payload)?;

        let mut values = HashMap::new();
        for name in template_vars(template)? {
            let value = self.lookup(&name, &headers)?;
            values.insert(name, value);
        }
        debug!(dataset_type = %dataset_type, values = ?values, "Resolved template variables");

        let relative = render(template, &values)?;
        let destination = self.archive_root.join(&relative).join(filename);

        Ok(ResolvedPath {
            relative,
            destination,
        })
    }

    /// Resolve one placeholder: derivations first, then direct header lookup
    fn lookup(&self, name: &str, headers: &PayloadHeaders) -> IngestResult<String> {
        match name {
            "camera" => self.camera_code(headers),
            "obsnight" => self.observing_night(headers),
            _ => headers
                .get(name)
                .map(str::to_string)
                .ok_or_else(|| IngestError::MissingMetadata(name.to_string())),
        }
    }

    /// Short camera code from the raw instrument identifier
    fn camera_code(&self, headers: &PayloadHeaders) -> IngestResult<String> {
        let instrument = headers
            .get("instrume")
            .ok_or_else(|| IngestError::MissingMetadata("instrume".to_string()))?;

        self.config
            .instrument_codes
            .get(instrument)
            .cloned()
            .ok_or_else(|| {
                IngestError::Consistency(format!(
                    "no short code configured for instrument: {instrument}"
                ))
            })
    }

    /// Observing-night bucket, `YYYYMMDD`
    fn observing_night(&self, headers: &PayloadHeaders) -> IngestResult<String> {
        if let Some(night) = headers.get("obs-night") {
            return Ok(night.to_string());
        }

        let date_obs = headers
            .get("date-obs")
            .ok_or_else(|| IngestError::MissingMetadata("date-obs".to_string()))?;

        let night = match NaiveDateTime::parse_from_str(date_obs, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(when) => {
                // observations before the cutoff belong to the previous night
                if when.hour() < self.config.night_cutoff_hour {
                    (when - Duration::days(1)).date()
                } else {
                    when.date()
                }
            }
            Err(_) => NaiveDate::parse_from_str(date_obs, "%Y-%m-%d").map_err(|_| {
                IngestError::MissingMetadata(format!("date-obs: unparseable value: {date_obs}"))
            })?,
        };

        Ok(night.format("%Y%m%d").to_string())
    }
}

/// Placeholder names referenced by a template, format specs stripped
fn template_vars(template: &str) -> IngestResult<Vec<String>> {
    let mut vars = Vec::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '{' {
            continue;
        }
        let mut inner = String::new();
        let mut closed = false;
        for c2 in chars.by_ref() {
            if c2 == '}' {
                closed = true;
                break;
            }
            inner.push(c2);
        }
        if !closed {
            return Err(IngestError::Consistency(format!(
                "unbalanced braces in path template: {template}"
            )));
        }
        let name = inner.split(':').next().unwrap_or("").trim().to_string();
        if !vars.contains(&name) {
            vars.push(name);
        }
    }

    Ok(vars)
}

/// Substitute placeholder values into a template
fn render(template: &str, values: &HashMap<String, String>) -> IngestResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut inner = String::new();
        for c2 in chars.by_ref() {
            if c2 == '}' {
                break;
            }
            inner.push(c2);
        }
        let name = inner.split(':').next().unwrap_or("").trim();
        let value = values
            .get(name)
            .ok_or_else(|| IngestError::MissingMetadata(name.to_string()))?;
        out.push_str(value);
    }

    Ok(out)
}
