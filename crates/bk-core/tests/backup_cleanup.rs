//! End-to-end backup and cleanup scenarios against in-memory backends.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use bk_archive::{generate_archive_name, parse_archive_name, sha256_file, ArchiveNameKind};
use bk_catalog::{
    ArtifactRecord, ArtifactStatus, ArtifactStore, Database, DeletionLogStore,
};
use bk_config::{
    Config, DatabaseConfig, LocalConfig, RemoteConfig, RetentionConfig, ScheduleConfig,
    SourceConfig,
};
use bk_core::{
    run_backup, run_cleanup, AgentContext, BackupFlags,
};
use bk_storage::{InMemoryObjectStore, LocalReplicator, RemoteReplicator, Replicator};
use bk_volumes::testing::FakeRuntime;

struct Harness {
    ctx: AgentContext,
    remote_store: Option<Arc<InMemoryObjectStore>>,
    _source_dir: tempfile::TempDir,
    local_root: tempfile::TempDir,
}

fn schedule(max_count: u32, max_days: u32) -> ScheduleConfig {
    ScheduleConfig {
        cron: "0 3 * * *".to_string(),
        retention: RetentionConfig { max_count, max_days },
        sources: None,
        timezone: None,
    }
}

/// A context with one `app` source holding `a.txt` and `b.txt`, a local
/// destination, and optionally an in-memory remote.
fn harness(max_count: u32, max_days: u32, with_remote: bool) -> Harness {
    let source_dir = tempfile::tempdir().unwrap();
    let source_root = source_dir.path().join("app");
    std::fs::create_dir(&source_root).unwrap();
    std::fs::write(source_root.join("a.txt"), "x").unwrap();
    std::fs::write(source_root.join("b.txt"), "y").unwrap();

    let local_root = tempfile::tempdir().unwrap();

    let mut sources = BTreeMap::new();
    sources.insert(
        "app".to_string(),
        SourceConfig {
            path: source_root,
            patterns: Vec::new(),
            remote_sub_prefix: None,
        },
    );
    let mut schedules = BTreeMap::new();
    schedules.insert("manual".to_string(), schedule(max_count, max_days));

    let config = Config {
        database: DatabaseConfig {
            path: "unused".into(),
        },
        sources,
        local: LocalConfig {
            enabled: true,
            path: local_root.path().to_path_buf(),
        },
        remote: RemoteConfig {
            enabled: with_remote,
            bucket: "bucket".to_string(),
            prefix: Some("backups".to_string()),
            ..Default::default()
        },
        schedules,
        archive: Default::default(),
        safety: Default::default(),
        volumes: Default::default(),
        timezone: None,
    };

    let catalog = Database::open_in_memory().unwrap();
    let mut replicators: Vec<Arc<dyn Replicator>> =
        vec![Arc::new(LocalReplicator::new(local_root.path()))];
    let remote_store = with_remote.then(|| Arc::new(InMemoryObjectStore::new()));
    if let Some(store) = &remote_store {
        replicators.push(Arc::new(RemoteReplicator::new("bucket", "backups", store.clone())));
    }

    let ctx = AgentContext::with_parts(config, catalog, replicators, Arc::new(FakeRuntime::new()));
    Harness {
        ctx,
        remote_store,
        _source_dir: source_dir,
        local_root,
    }
}

fn local_files(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn single_source_backup_local_only() {
    let h = harness(7, 30, false);
    let outcome = run_backup(&h.ctx, "manual", &BackupFlags::default()).await.unwrap();

    // Exactly one archive landed in the local root.
    let files = local_files(h.local_root.path());
    assert_eq!(files.len(), 1);

    let parsed = parse_archive_name(&files[0]).unwrap();
    assert_eq!(parsed.kind, ArchiveNameKind::Files);
    assert_eq!(parsed.prefix, "backitup");
    assert_eq!(parsed.schedule, "manual");
    assert_eq!(parsed.sources, "app");

    // Exactly one catalog row with the expected shape.
    let records = h.ctx.list_artifacts(Some("manual"), None).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, ArtifactStatus::Active);
    assert!(record.local.path.as_deref().unwrap().starts_with(
        h.local_root.path().to_str().unwrap()
    ));
    assert!(record.remote.key.is_none());
    match &record.detail {
        bk_catalog::ArtifactDetail::Files { files_count, .. } => assert_eq!(*files_count, 2),
        _ => panic!("expected files detail"),
    }

    let archive = outcome.archive.unwrap();
    assert_eq!(archive.files_count, 2);
    assert_eq!(archive.remote_key, None);
    assert_eq!(archive.artifact_id.as_deref(), Some(record.artifact_id.as_str()));
}

#[tokio::test]
async fn backup_replicates_to_both_destinations() {
    let h = harness(7, 30, true);
    let outcome = run_backup(&h.ctx, "manual", &BackupFlags::default()).await.unwrap();
    let archive = outcome.archive.unwrap();

    let key = archive.remote_key.unwrap();
    assert!(key.starts_with("backups/app/"));
    assert!(h.remote_store.as_ref().unwrap().get("bucket", &key).is_some());

    let record = &h.ctx.list_artifacts(Some("manual"), None).unwrap()[0];
    assert!(record.local.path.is_some());
    assert_eq!(record.remote.bucket.as_deref(), Some("bucket"));
    assert_eq!(record.remote.key.as_deref(), Some(key.as_str()));
}

#[tokio::test]
async fn dry_run_produces_no_side_effects() {
    let h = harness(7, 30, true);
    let outcome = run_backup(
        &h.ctx,
        "manual",
        &BackupFlags {
            dry_run: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let archive = outcome.archive.unwrap();
    assert!(archive.artifact_id.is_none());
    let predicted_local = archive.local_path.unwrap();
    assert!(predicted_local.starts_with(h.local_root.path().to_str().unwrap()));
    assert!(archive.remote_key.unwrap().starts_with("backups/app/"));

    // Nothing was persisted anywhere.
    assert!(local_files(h.local_root.path()).is_empty());
    assert!(h.ctx.list_artifacts(None, None).unwrap().is_empty());
    assert!(h.remote_store.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn local_and_remote_only_flags_select_destinations() {
    let h = harness(7, 30, true);

    run_backup(
        &h.ctx,
        "manual",
        &BackupFlags {
            local_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(h.remote_store.as_ref().unwrap().is_empty());
    assert_eq!(local_files(h.local_root.path()).len(), 1);

    run_backup(
        &h.ctx,
        "manual",
        &BackupFlags {
            remote_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(h.remote_store.as_ref().unwrap().len(), 1);
    assert_eq!(local_files(h.local_root.path()).len(), 1);
}

#[tokio::test]
async fn unknown_schedule_is_rejected() {
    let h = harness(7, 30, false);
    assert!(run_backup(&h.ctx, "nope", &BackupFlags::default()).await.is_err());
}

/// Insert a synthetic artifact with a real file under the local root.
fn seed_artifact(h: &Harness, created_at: chrono::DateTime<chrono::Utc>) -> ArtifactRecord {
    let filename = generate_archive_name("backitup", "manual", &["app".to_string()], created_at);
    let path = h.local_root.path().join(&filename);
    std::fs::write(&path, filename.as_bytes()).unwrap();
    let checksum = sha256_file(&path).unwrap();

    let mut record = ArtifactRecord::new_files(
        "manual",
        &filename,
        filename.len() as u64,
        &checksum,
        vec!["/srv/app".to_string()],
        2,
    );
    record.created_at = created_at.to_rfc3339();

    h.ctx
        .catalog()
        .with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let inserted = store.insert(&record)?;
            store.update_local(&inserted.artifact_id, path.to_str().unwrap())?;
            store.get(&inserted.artifact_id).map(|r| r.unwrap())
        })
        .unwrap()
}

#[tokio::test]
async fn retention_by_count_deletes_oldest() {
    let h = harness(3, 10_000, false);
    let now = chrono::Utc::now();
    let mut ids = Vec::new();
    for i in 0..10 {
        let record = seed_artifact(&h, now - chrono::Duration::days(i));
        ids.push(record.artifact_id);
    }

    let outcome = run_cleanup(&h.ctx, "manual", false).await.unwrap();
    assert_eq!(outcome.examined, 10);
    assert_eq!(outcome.deleted.len(), 7);
    assert!(outcome.skipped.is_empty());
    assert!(outcome.errors.is_empty());

    // The three newest artifacts survive, on disk and in the catalog.
    let remaining = h.ctx.list_artifacts(Some("manual"), None).unwrap();
    assert_eq!(remaining.len(), 3);
    let kept: Vec<&String> = ids.iter().take(3).collect();
    for record in &remaining {
        assert!(kept.contains(&&record.artifact_id));
    }
    assert_eq!(local_files(h.local_root.path()).len(), 3);
}

#[tokio::test]
async fn tampered_file_blocks_deletion() {
    let h = harness(1, 10_000, false);
    let now = chrono::Utc::now();
    let keep = seed_artifact(&h, now);
    let victim = seed_artifact(&h, now - chrono::Duration::days(5));

    // Overwrite the victim's bytes after insertion.
    std::fs::write(victim.local.path.as_deref().unwrap(), b"tampered").unwrap();

    let outcome = run_cleanup(&h.ctx, "manual", false).await.unwrap();
    assert!(outcome.deleted.is_empty());
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].1.contains("tampered"));

    // File untouched, status still active, failed attempt logged.
    assert!(Path::new(victim.local.path.as_deref().unwrap()).is_file());
    let record = h.ctx.get_artifact(&victim.artifact_id).unwrap().unwrap();
    assert_eq!(record.status, ArtifactStatus::Active);

    let entries = h
        .ctx
        .catalog()
        .with_conn(|conn| DeletionLogStore::new(conn).list_for_artifact(&victim.artifact_id))
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
    assert!(entries[0].error.as_deref().unwrap().contains("tampered"));

    let _ = keep;
}

#[tokio::test]
async fn cleanup_dry_run_deletes_nothing() {
    let h = harness(1, 10_000, false);
    let now = chrono::Utc::now();
    seed_artifact(&h, now);
    seed_artifact(&h, now - chrono::Duration::days(1));

    let outcome = run_cleanup(&h.ctx, "manual", true).await.unwrap();
    assert_eq!(outcome.would_delete.len(), 1);
    assert!(outcome.deleted.is_empty());
    assert_eq!(h.ctx.list_artifacts(Some("manual"), None).unwrap().len(), 2);
    assert_eq!(local_files(h.local_root.path()).len(), 2);
}

#[tokio::test]
async fn cleanup_twice_is_idempotent() {
    let h = harness(2, 10_000, false);
    let now = chrono::Utc::now();
    for i in 0..5 {
        seed_artifact(&h, now - chrono::Duration::days(i));
    }

    let first = run_cleanup(&h.ctx, "manual", false).await.unwrap();
    assert_eq!(first.deleted.len(), 3);

    let after_first = h.ctx.list_artifacts(Some("manual"), None).unwrap();
    let second = run_cleanup(&h.ctx, "manual", false).await.unwrap();
    assert!(second.deleted.is_empty());
    assert!(second.errors.is_empty());
    assert_eq!(h.ctx.list_artifacts(Some("manual"), None).unwrap(), after_first);
}

#[tokio::test]
async fn missing_local_file_is_not_fatal_to_cleanup() {
    let h = harness(1, 10_000, false);
    let now = chrono::Utc::now();
    seed_artifact(&h, now);
    let victim = seed_artifact(&h, now - chrono::Duration::days(3));

    // The archive vanished out from under the catalog.
    std::fs::remove_file(victim.local.path.as_deref().unwrap()).unwrap();

    let outcome = run_cleanup(&h.ctx, "manual", false).await.unwrap();
    assert_eq!(outcome.deleted, vec![victim.artifact_id.clone()]);

    let record = h.ctx.get_artifact(&victim.artifact_id).unwrap().unwrap();
    assert_eq!(record.status, ArtifactStatus::Deleted);
    assert!(record.local.deleted_at.is_some());
}

#[tokio::test]
async fn cleanup_deletes_remote_objects_too() {
    let h = harness(1, 10_000, true);

    // Two real backups through the orchestrator, a minute apart in catalog
    // order via distinct creation stamps.
    run_backup(&h.ctx, "manual", &BackupFlags::default()).await.unwrap();
    run_backup(&h.ctx, "manual", &BackupFlags::default()).await.unwrap();
    assert_eq!(h.remote_store.as_ref().unwrap().len(), 2);

    let outcome = run_cleanup(&h.ctx, "manual", false).await.unwrap();
    assert_eq!(outcome.deleted.len(), 1);
    assert_eq!(h.remote_store.as_ref().unwrap().len(), 1);
    assert_eq!(local_files(h.local_root.path()).len(), 1);
    assert_eq!(h.ctx.list_artifacts(Some("manual"), None).unwrap().len(), 1);
}
