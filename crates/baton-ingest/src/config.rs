//! Configuration management
//!
//! Settings come from a TOML file (`-c/--config`) layered with `BATON_*`
//! environment variables (double underscore as section separator, e.g.
//! `BATON_DATABASE__URL`).

use baton_common::checksum::{ChecksumAlgorithm, DEFAULT_BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default maximum copy attempts before a transfer is abandoned.
pub const DEFAULT_TRANSFER_ATTEMPTS: u32 = 5;

/// Default wait between transfer attempts in seconds (fixed, not exponential).
pub const DEFAULT_TRANSFER_BACKOFF_SECS: u64 = 5;

/// Default observing-night cutoff hour: observations earlier than this hour
/// are attributed to the previous calendar day.
pub const DEFAULT_NIGHT_CUTOFF_HOUR: u32 = 14;

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory the upstream producer delivers bundles into
    pub staging_dir: PathBuf,

    /// Root of the managed archive files are moved under
    pub archive_root: PathBuf,

    /// Root of the rejection area for quarantined bundles
    pub quarantine_root: PathBuf,

    /// Root under which per-bundle scratch workspaces are created
    pub scratch_root: PathBuf,

    /// Relative-path template per dataset type, `{name}` placeholders
    pub path_templates: HashMap<String, String>,

    #[serde(default)]
    pub checksum: ChecksumConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    pub database: DatabaseConfig,
}

/// Checksum algorithm settings for integrity verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumConfig {
    #[serde(default)]
    pub algorithm: ChecksumAlgorithm,

    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            algorithm: ChecksumAlgorithm::default(),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Destination path derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Raw instrument identifier -> short code used in archive paths
    #[serde(default)]
    pub instrument_codes: HashMap<String, String>,

    /// Observing-night day-boundary hour
    #[serde(default = "default_night_cutoff_hour")]
    pub night_cutoff_hour: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            instrument_codes: HashMap::new(),
            night_cutoff_hour: DEFAULT_NIGHT_CUTOFF_HOUR,
        }
    }
}

/// Transfer engine retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_transfer_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_transfer_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TRANSFER_ATTEMPTS,
            backoff_secs: DEFAULT_TRANSFER_BACKOFF_SECS,
        }
    }
}

/// Registry database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_database_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_database_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_night_cutoff_hour() -> u32 {
    DEFAULT_NIGHT_CUTOFF_HOUR
}

fn default_transfer_attempts() -> u32 {
    DEFAULT_TRANSFER_ATTEMPTS
}

fn default_transfer_backoff_secs() -> u64 {
    DEFAULT_TRANSFER_BACKOFF_SECS
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_database_connect_timeout_secs() -> u64 {
    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS
}

impl IngestConfig {
    /// Load configuration from a TOML file plus environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config: IngestConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("BATON").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.path_templates.is_empty() {
            anyhow::bail!("At least one dataset-type path template must be configured");
        }

        if self.resolver.night_cutoff_hour >= 24 {
            anyhow::bail!(
                "Night cutoff hour must be below 24, got {}",
                self.resolver.night_cutoff_hour
            );
        }

        if self.transfer.max_attempts == 0 {
            anyhow::bail!("Transfer max_attempts must be greater than 0");
        }

        if self.checksum.block_size == 0 {
            anyhow::bail!("Checksum block_size must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        Ok(())
    }
}
