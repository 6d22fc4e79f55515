//! End-to-end ingest pass scenarios against an in-memory registry

mod common;

use baton_ingest::orchestrator::Orchestrator;
use baton_ingest::registration::ProcessIdentity;
use common::{deliver, make_config, BundleSpec, MockRegistry};

fn orchestrator(config: baton_ingest::config::IngestConfig) -> Orchestrator {
    Orchestrator::new(
        config,
        ProcessIdentity {
            exec_name: "baton-ingest".to_string(),
            exec_host: "testhost".to_string(),
        },
        false,
        false,
    )
}

#[tokio::test]
async fn test_successful_ingest() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    let bundle = deliver(&config.staging_dir, &BundleSpec::new("obs_1", "d-001", "obs_1.fits"));

    let archive_root = config.archive_root.clone();
    let mut registry = MockRegistry::default();
    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.quarantined, 0);

    // one committed dataset and one datastore entry at the resolved path
    assert_eq!(registry.datasets.len(), 1);
    assert_eq!(registry.entries.len(), 1);
    assert_eq!(registry.entries[0].filename, "obs_1.fits");
    assert_eq!(registry.entries[0].relpath, "ATS/20260819");
    assert_eq!(registry.commits, 1);
    assert_eq!(registry.finished.len(), 1);

    // payload archived, bundle gone from staging
    let archived = archive_root.join("ATS/20260819/obs_1.fits");
    assert!(archived.exists());
    assert!(!bundle.exists());
}

#[tokio::test]
async fn test_duplicate_filename_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    let archive_root = config.archive_root.clone();
    let quarantine_root = config.quarantine_root.clone();

    let first = deliver(&config.staging_dir, &BundleSpec::new("obs_1", "d-001", "obs_1.fits"));
    let mut registry = MockRegistry::default();
    let orch = orchestrator(config.clone());
    orch.run(&mut registry).await.unwrap();
    assert!(!first.exists());

    // second delivery carries the same payload filename
    let second = deliver(&config.staging_dir, &BundleSpec::new("obs_1_redo", "d-002", "obs_1.fits"));
    let stats = orch.run(&mut registry).await.unwrap();

    assert_eq!(stats.quarantined, 1);
    assert_eq!(stats.ingested, 0);
    assert!(!second.exists());
    assert_eq!(registry.bad_files.len(), 1);
    assert_eq!(registry.bad_files[0].reason, "Duplicate file: obs_1.fits");
    assert!(quarantine_root
        .join(&registry.bad_files[0].quarantine_relpath)
        .exists());

    // the first registration is untouched
    assert_eq!(registry.entries.len(), 1);
    assert!(archive_root.join("ATS/20260819/obs_1.fits").exists());
}

#[tokio::test]
async fn test_integrity_failure_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    let quarantine_root = config.quarantine_root.clone();

    let mut spec = BundleSpec::new("obs_2", "d-003", "obs_2.fits");
    spec.digest_payload_sum = Some("00000000000000000000000000000000");
    deliver(&config.staging_dir, &spec);

    let mut registry = MockRegistry::default();
    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(stats.quarantined, 1);
    assert!(registry.datasets.is_empty());
    assert!(registry.entries.is_empty());
    assert_eq!(registry.bad_files.len(), 1);
    assert!(registry.bad_files[0].reason.starts_with("Integrity error"));

    // lands in a year/month bucket
    let relpath = &registry.bad_files[0].quarantine_relpath;
    assert_eq!(relpath.split('/').count(), 3);
    assert!(quarantine_root.join(relpath).exists());
}

#[tokio::test]
async fn test_manifest_digest_disagreement_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());

    let mut spec = BundleSpec::new("obs_3", "d-004", "obs_3.fits");
    spec.manifest_sum = Some("ffffffffffffffffffffffffffffffff");
    deliver(&config.staging_dir, &spec);

    let mut registry = MockRegistry::default();
    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(stats.quarantined, 1);
    assert!(registry.bad_files[0].reason.starts_with("Consistency error"));
    // the manifest parsed, so its fields are carried into the record
    assert_eq!(registry.bad_files[0].filename.as_deref(), Some("obs_3.fits"));
}

#[tokio::test]
async fn test_process_row_reused_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    deliver(&config.staging_dir, &BundleSpec::new("obs_4", "d-005", "obs_4.fits"));

    let mut registry = MockRegistry::default();
    registry.seed_process("d-005", 42);

    orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(registry.processes.len(), 1);
    assert_eq!(registry.datasets[0].1, 42);
    assert_eq!(registry.finished, vec![42]);
}

#[tokio::test]
async fn test_preexisting_destination_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    let archive_root = config.archive_root.clone();

    deliver(&config.staging_dir, &BundleSpec::new("obs_5", "d-006", "obs_5.fits"));

    let dest = archive_root.join("ATS/20260819/obs_5.fits");
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    std::fs::write(&dest, b"someone else's file").unwrap();

    let mut registry = MockRegistry::default();
    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(stats.quarantined, 1);
    assert!(registry.bad_files[0].reason.starts_with("Consistency error"));
    // staged rows rolled back, the occupant left alone
    assert!(registry.datasets.is_empty());
    assert_eq!(registry.rollbacks, 1);
    assert_eq!(std::fs::read(&dest).unwrap(), b"someone else's file");
}

#[tokio::test]
async fn test_empty_staging_is_a_clean_pass() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());

    let mut registry = MockRegistry::default();
    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(stats.scanned, 0);
    assert_eq!(stats.ingested, 0);
    assert!(registry.bad_files.is_empty());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    let archive_root = config.archive_root.clone();
    let bundle = deliver(&config.staging_dir, &BundleSpec::new("obs_6", "d-007", "obs_6.fits"));

    let orch = Orchestrator::new(
        config,
        ProcessIdentity {
            exec_name: "baton-ingest".to_string(),
            exec_host: "testhost".to_string(),
        },
        true,
        false,
    );
    let mut registry = MockRegistry::default();
    let stats = orch.run(&mut registry).await.unwrap();

    assert_eq!(stats.ingested, 0);
    assert_eq!(stats.quarantined, 0);
    assert!(bundle.exists());
    assert!(registry.processes.is_empty());
    assert!(!archive_root.join("ATS/20260819/obs_6.fits").exists());
}

#[tokio::test]
async fn test_committed_bundle_never_quarantined_on_cleanup_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());
    let archive_root = config.archive_root.clone();
    let bundle = deliver(&config.staging_dir, &BundleSpec::new("obs_9", "d-010", "obs_9.fits"));

    // the bundle vanishes at commit time, so the staging cleanup fails
    // after the registration is already durable
    let mut registry = MockRegistry::default();
    registry.remove_on_commit = Some(bundle.clone());

    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    // counted as ingested, not routed through quarantine
    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.quarantined, 0);
    assert!(registry.bad_files.is_empty());
    assert_eq!(registry.rollbacks, 0);

    // the committed registration still points at a real archive file
    assert_eq!(registry.entries.len(), 1);
    assert_eq!(registry.entries[0].filename, "obs_9.fits");
    assert!(archive_root.join("ATS/20260819/obs_9.fits").exists());
}

#[tokio::test]
async fn test_mixed_pass_continues_after_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path());

    let mut bad = BundleSpec::new("obs_7", "d-008", "obs_7.fits");
    bad.digest_payload_sum = Some("00000000000000000000000000000000");
    let bad_path = deliver(&config.staging_dir, &bad);
    // make the bad bundle older so it is processed first
    let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
    std::fs::OpenOptions::new()
        .write(true)
        .open(&bad_path)
        .unwrap()
        .set_modified(earlier)
        .unwrap();

    deliver(&config.staging_dir, &BundleSpec::new("obs_8", "d-009", "obs_8.fits"));

    let mut registry = MockRegistry::default();
    let stats = orchestrator(config).run(&mut registry).await.unwrap();

    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.quarantined, 1);
    assert_eq!(stats.ingested, 1);
    assert_eq!(registry.entries[0].filename, "obs_8.fits");
}
