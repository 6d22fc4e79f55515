//! Baton Ingest Library
//!
//! Batch ingest agent for delivery bundles: scans a staging area for tar
//! bundles, verifies their integrity, moves payloads into a managed archive,
//! and records provenance in a transactional registry. Faulty bundles are
//! quarantined with a recorded reason instead of aborting the run.
//!
//! # Example
//!
//! ```no_run
//! use baton_ingest::config::IngestConfig;
//! use baton_ingest::orchestrator::Orchestrator;
//! use baton_ingest::registration::ProcessIdentity;
//! use baton_ingest::registry::PgRegistry;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load(Path::new("baton.toml"))?;
//!     let mut registry = PgRegistry::connect(&config.database).await?;
//!     let identity = ProcessIdentity {
//!         exec_name: "baton-ingest".to_string(),
//!         exec_host: "archiver01".to_string(),
//!     };
//!     let stats = Orchestrator::new(config, identity, false, false)
//!         .run(&mut registry)
//!         .await?;
//!     println!("ingested {}", stats.ingested);
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod config;
pub mod digest;
pub mod error;
pub mod headers;
pub mod manifest;
pub mod orchestrator;
pub mod quarantine;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod transfer;
pub mod verify;

pub use error::{IngestError, IngestResult};
