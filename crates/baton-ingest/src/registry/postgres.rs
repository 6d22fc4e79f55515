//! PostgreSQL registry backend
//!
//! One transaction is opened lazily per bundle and either committed after a
//! successful registration or rolled back on quarantine. Process rows and
//! bad-file rows run against the pool directly so they commit on their own.

use super::{BadFileRecord, DatastoreEntry, NewProcess, Registry};
use crate::config::DatabaseConfig;
use crate::error::IngestResult;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};

pub struct PgRegistry {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgRegistry {
    /// Connect to the registry database
    pub async fn connect(config: &DatabaseConfig) -> IngestResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to registry database");

        Ok(Self { pool, tx: None })
    }

    /// Current transaction, opened on first use
    async fn tx(&mut self) -> IngestResult<&mut Transaction<'static, Postgres>> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await?);
            debug!("Opened registry transaction");
        }
        Ok(self.tx.as_mut().unwrap())
    }
}

#[async_trait]
impl Registry for PgRegistry {
    async fn lookup_process(&mut self, uuid: &str) -> IngestResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT process_id FROM process_lookup WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create_process(&mut self, process: &NewProcess) -> IngestResult<i64> {
        // Own transaction: the row and its lookup entry must be durable
        // before dataset work starts, regardless of what happens later.
        let mut tx = self.pool.begin().await?;

        let process_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO process (exec_name, exec_host, start_time, username, prov_msg)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING process_id
            "#,
        )
        .bind(&process.exec_name)
        .bind(&process.exec_host)
        .bind(process.start_time)
        .bind(&process.username)
        .bind(&process.provenance_message)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO process_lookup (uuid, process_id) VALUES ($1, $2)")
            .bind(&process.uuid)
            .bind(process_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(process_id, uuid = %process.uuid, "Created process row");
        Ok(process_id)
    }

    async fn filename_exists(&mut self, filename: &str) -> IngestResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM datastore WHERE filename = $1)",
        )
        .bind(filename)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_dataset(&mut self, process_id: i64, dataset_type: &str) -> IngestResult<i64> {
        let tx = self.tx().await?;

        let dataset_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO dataset (process_id, dataset_type)
            VALUES ($1, $2)
            RETURNING dataset_id
            "#,
        )
        .bind(process_id)
        .bind(dataset_type)
        .fetch_one(&mut **tx)
        .await?;

        Ok(dataset_id)
    }

    async fn create_datastore_entry(&mut self, entry: &DatastoreEntry) -> IngestResult<()> {
        let tx = self.tx().await?;

        sqlx::query(
            r#"
            INSERT INTO datastore (dataset_id, filename, relpath, filesize, checksum, checksum_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.dataset_id)
        .bind(&entry.filename)
        .bind(&entry.relpath)
        .bind(entry.filesize)
        .bind(&entry.checksum)
        .bind(&entry.checksum_type)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn finish_process(&mut self, process_id: i64) -> IngestResult<()> {
        let tx = self.tx().await?;

        sqlx::query("UPDATE process SET end_time = NOW() WHERE process_id = $1")
            .bind(process_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn record_bad_file(&mut self, record: &BadFileRecord) -> IngestResult<()> {
        // Runs against the pool so the record survives the surrounding rollback.
        sqlx::query(
            r#"
            INSERT INTO bad_file (
                bundle_name, quarantine_relpath, disk_usage, reason,
                delivery_time, rejected_time,
                filename, dataset_type, filesize, checksum, checksum_type, process_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&record.bundle_name)
        .bind(&record.quarantine_relpath)
        .bind(record.disk_usage)
        .bind(&record.reason)
        .bind(record.delivery_time)
        .bind(record.rejected_time)
        .bind(&record.filename)
        .bind(&record.dataset_type)
        .bind(record.filesize)
        .bind(&record.checksum)
        .bind(&record.checksum_type)
        .bind(record.process_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn commit(&mut self) -> IngestResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!("Committed registry transaction");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> IngestResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!("Rolled back registry transaction");
        }
        Ok(())
    }
}
