//! Provenance registry
//!
//! The registry records which process handled which bundle, the datasets
//! created from accepted payloads, their archive locations, and a separate
//! ledger of rejected bundles. The workflow talks to it only through the
//! [`Registry`] trait so the ingest logic never builds SQL and tests can run
//! against an in-memory double.

mod postgres;

pub use postgres::PgRegistry;

use crate::error::IngestResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A process row, created once per delivery (keyed by the manifest uuid)
#[derive(Debug, Clone)]
pub struct NewProcess {
    /// Delivery identifier from the manifest; reruns reuse the same row
    pub uuid: String,
    pub exec_name: String,
    pub exec_host: String,
    pub start_time: DateTime<Utc>,
    pub username: String,
    pub provenance_message: String,
}

/// An archived payload's location and identity
#[derive(Debug, Clone)]
pub struct DatastoreEntry {
    pub dataset_id: i64,
    pub filename: String,
    pub relpath: String,
    pub filesize: i64,
    pub checksum: String,
    pub checksum_type: String,
}

/// One quarantined bundle, recorded independently of any open transaction
#[derive(Debug, Clone)]
pub struct BadFileRecord {
    pub bundle_name: String,
    pub quarantine_relpath: String,
    pub disk_usage: i64,
    pub reason: String,
    pub delivery_time: DateTime<Utc>,
    pub rejected_time: DateTime<Utc>,
    /// Manifest fields, present when the manifest was readable
    pub filename: Option<String>,
    pub dataset_type: Option<String>,
    pub filesize: Option<i64>,
    pub checksum: Option<String>,
    pub checksum_type: Option<String>,
    pub process_id: Option<i64>,
}

/// Transactional provenance store
///
/// Mutating calls accumulate in one open transaction per bundle, except
/// [`Registry::create_process`] and [`Registry::record_bad_file`], which
/// commit on their own so their rows survive a later rollback.
#[async_trait]
pub trait Registry: Send {
    /// Process id previously recorded for this delivery uuid, if any
    async fn lookup_process(&mut self, uuid: &str) -> IngestResult<Option<i64>>;

    /// Create a process row and commit it immediately
    ///
    /// The row must exist durably before any dataset work starts, so a
    /// rerun after a mid-bundle failure finds and reuses it.
    async fn create_process(&mut self, process: &NewProcess) -> IngestResult<i64>;

    /// Whether a payload with this filename was already archived
    async fn filename_exists(&mut self, filename: &str) -> IngestResult<bool>;

    /// Create a dataset row inside the current transaction
    async fn create_dataset(&mut self, process_id: i64, dataset_type: &str) -> IngestResult<i64>;

    /// Record an archived payload inside the current transaction
    async fn create_datastore_entry(&mut self, entry: &DatastoreEntry) -> IngestResult<()>;

    /// Mark the process finished inside the current transaction
    async fn finish_process(&mut self, process_id: i64) -> IngestResult<()>;

    /// Record a quarantined bundle, committing independently
    async fn record_bad_file(&mut self, record: &BadFileRecord) -> IngestResult<()>;

    /// Commit the current transaction
    async fn commit(&mut self) -> IngestResult<()>;

    /// Roll back the current transaction, discarding staged rows
    async fn rollback(&mut self) -> IngestResult<()>;
}
