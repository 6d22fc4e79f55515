//! Common test utilities for ingest integration tests
//!
//! Provides an in-memory registry double with real staging/commit semantics
//! and helpers for building well-formed (or deliberately broken) delivery
//! bundles in a temporary staging area.

use async_trait::async_trait;
use baton_common::checksum::{compute_checksum, ChecksumAlgorithm, DEFAULT_BLOCK_SIZE};
use baton_ingest::config::{
    ChecksumConfig, DatabaseConfig, IngestConfig, ResolverConfig, TransferConfig,
};
use baton_ingest::registry::{BadFileRecord, DatastoreEntry, NewProcess, Registry};
use baton_ingest::IngestResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Registry double that distinguishes staged rows from committed ones
///
/// `create_process` and `record_bad_file` commit immediately, matching the
/// production backend; everything else stays staged until `commit`.
#[derive(Default)]
pub struct MockRegistry {
    next_id: i64,
    pub processes: HashMap<String, i64>,
    pub datasets: Vec<(i64, i64, String)>,
    pub entries: Vec<DatastoreEntry>,
    pub finished: Vec<i64>,
    pub bad_files: Vec<BadFileRecord>,
    pub commits: usize,
    pub rollbacks: usize,
    /// Deleted at commit time, simulating another actor taking the delivery
    /// bundle between commit and staging cleanup
    pub remove_on_commit: Option<PathBuf>,
    staged_datasets: Vec<(i64, i64, String)>,
    staged_entries: Vec<DatastoreEntry>,
    staged_finished: Vec<i64>,
}

impl MockRegistry {
    /// Pretend a previous run already created a process row for this uuid
    pub fn seed_process(&mut self, uuid: &str, process_id: i64) {
        self.processes.insert(uuid.to_string(), process_id);
        self.next_id = self.next_id.max(process_id);
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn lookup_process(&mut self, uuid: &str) -> IngestResult<Option<i64>> {
        Ok(self.processes.get(uuid).copied())
    }

    async fn create_process(&mut self, process: &NewProcess) -> IngestResult<i64> {
        self.next_id += 1;
        self.processes.insert(process.uuid.clone(), self.next_id);
        Ok(self.next_id)
    }

    async fn filename_exists(&mut self, filename: &str) -> IngestResult<bool> {
        Ok(self.entries.iter().any(|e| e.filename == filename))
    }

    async fn create_dataset(&mut self, process_id: i64, dataset_type: &str) -> IngestResult<i64> {
        self.next_id += 1;
        self.staged_datasets
            .push((self.next_id, process_id, dataset_type.to_string()));
        Ok(self.next_id)
    }

    async fn create_datastore_entry(&mut self, entry: &DatastoreEntry) -> IngestResult<()> {
        self.staged_entries.push(entry.clone());
        Ok(())
    }

    async fn finish_process(&mut self, process_id: i64) -> IngestResult<()> {
        self.staged_finished.push(process_id);
        Ok(())
    }

    async fn record_bad_file(&mut self, record: &BadFileRecord) -> IngestResult<()> {
        self.bad_files.push(record.clone());
        Ok(())
    }

    async fn commit(&mut self) -> IngestResult<()> {
        self.datasets.append(&mut self.staged_datasets);
        self.entries.append(&mut self.staged_entries);
        self.finished.append(&mut self.staged_finished);
        self.commits += 1;
        if let Some(path) = &self.remove_on_commit {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> IngestResult<()> {
        self.staged_datasets.clear();
        self.staged_entries.clear();
        self.staged_finished.clear();
        self.rollbacks += 1;
        Ok(())
    }
}

/// Payload body with a parseable header block
pub const PAYLOAD_HEADERS: &str = "INSTRUME = ATSCAM\nDATE-OBS = 2026-08-20T03:14:15.9\nEND\n";

/// Configuration rooted at `root`, with directories created
pub fn make_config(root: &Path) -> IngestConfig {
    let config = IngestConfig {
        staging_dir: root.join("staging"),
        archive_root: root.join("archive"),
        quarantine_root: root.join("rejected"),
        scratch_root: root.join("scratch"),
        path_templates: HashMap::from([("raw".to_string(), "{camera}/{obsnight}".to_string())]),
        checksum: ChecksumConfig::default(),
        resolver: ResolverConfig {
            instrument_codes: HashMap::from([("ATSCAM".to_string(), "ATS".to_string())]),
            night_cutoff_hour: 14,
        },
        transfer: TransferConfig {
            max_attempts: 2,
            backoff_secs: 0,
        },
        database: DatabaseConfig {
            url: "postgresql://unused/test".to_string(),
            max_connections: 1,
            connect_timeout_secs: 1,
        },
    };
    std::fs::create_dir_all(&config.staging_dir).unwrap();
    std::fs::create_dir_all(&config.archive_root).unwrap();
    std::fs::create_dir_all(&config.quarantine_root).unwrap();
    std::fs::create_dir_all(&config.scratch_root).unwrap();
    config
}

/// A bundle under construction
pub struct BundleSpec<'a> {
    pub stem: &'a str,
    pub uuid: &'a str,
    pub payload_name: &'a str,
    pub payload: Vec<u8>,
    /// Overrides the real payload checksum in the digest file
    pub digest_payload_sum: Option<&'a str>,
    /// Overrides the real payload checksum in the manifest
    pub manifest_sum: Option<&'a str>,
}

impl<'a> BundleSpec<'a> {
    pub fn new(stem: &'a str, uuid: &'a str, payload_name: &'a str) -> Self {
        Self {
            stem,
            uuid,
            payload_name,
            payload: format!("{PAYLOAD_HEADERS}image bytes for {stem}").into_bytes(),
            digest_payload_sum: None,
            manifest_sum: None,
        }
    }
}

/// Build a delivery bundle in the staging directory, returning its path
pub fn deliver(staging_dir: &Path, spec: &BundleSpec) -> PathBuf {
    let md5 = |bytes: &[u8]| {
        compute_checksum(&mut &bytes[..], ChecksumAlgorithm::Md5, DEFAULT_BLOCK_SIZE).unwrap()
    };

    let payload_sum = md5(&spec.payload);
    let manifest_sum_field = spec.manifest_sum.unwrap_or(&payload_sum);
    let manifest = format!(
        "uuid: {}\nfilename: {}\ndataset_type: raw\nchecksum: {}\n\
         checksum_type: md5\nfilesize: {}\ntimestamp: 1755907200.5\nuser: producer\n\
         provenance_message: integration delivery\n",
        spec.uuid,
        spec.payload_name,
        manifest_sum_field,
        spec.payload.len(),
    );

    let manifest_name = format!("{}.manifest", spec.stem);
    let digest_name = format!("{}.digest", spec.stem);
    let digest_payload_sum = spec.digest_payload_sum.unwrap_or(&payload_sum);
    let digest = format!(
        "{digest_payload_sum}\t{}\n{}\t{manifest_name}\n",
        spec.payload_name,
        md5(manifest.as_bytes()),
    );

    let bundle_path = staging_dir.join(format!("{}.tar", spec.stem));
    let mut builder = tar::Builder::new(std::fs::File::create(&bundle_path).unwrap());
    for (name, data) in [
        (spec.payload_name.to_string(), spec.payload.as_slice()),
        (manifest_name, manifest.as_bytes()),
        (digest_name, digest.as_bytes()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }
    builder.into_inner().unwrap();

    bundle_path
}
