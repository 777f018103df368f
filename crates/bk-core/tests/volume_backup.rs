//! Volume backup through the orchestrator against a fake runtime.

use std::collections::BTreeMap;
use std::sync::Arc;

use bk_catalog::{ArtifactDetail, ArtifactKind, Database};
use bk_config::{
    Config, ContainerStopConfig, DatabaseConfig, LocalConfig, RemoteConfig, RetentionConfig,
    ScheduleConfig, VolumeSourceConfig, VolumesConfig,
};
use bk_core::{run_backup, AgentContext, BackupFlags};
use bk_storage::{InMemoryObjectStore, LocalReplicator, RemoteReplicator, Replicator};
use bk_volumes::testing::FakeRuntime;
use bk_volumes::RestartPolicy;

struct Harness {
    ctx: AgentContext,
    runtime: Arc<FakeRuntime>,
    remote_store: Arc<InMemoryObjectStore>,
    local_root: tempfile::TempDir,
}

fn volume_item(name: &str, stop: bool) -> VolumeSourceConfig {
    VolumeSourceConfig {
        name: name.to_string(),
        kind: None,
        compose_file: None,
        project: None,
        container_stop: stop.then(|| ContainerStopConfig {
            stop: true,
            stop_timeout: 5,
            restart_retries: 2,
            restart_retry_delay: 1,
        }),
    }
}

fn harness(items: Vec<VolumeSourceConfig>) -> Harness {
    let local_root = tempfile::tempdir().unwrap();

    let mut schedules = BTreeMap::new();
    schedules.insert(
        "nightly".to_string(),
        ScheduleConfig {
            cron: "0 3 * * *".to_string(),
            retention: RetentionConfig {
                max_count: 7,
                max_days: 30,
            },
            sources: None,
            timezone: None,
        },
    );

    let config = Config {
        database: DatabaseConfig {
            path: "unused".into(),
        },
        sources: BTreeMap::new(),
        local: LocalConfig {
            enabled: true,
            path: local_root.path().to_path_buf(),
        },
        remote: RemoteConfig {
            enabled: true,
            bucket: "bucket".to_string(),
            prefix: Some("backups".to_string()),
            ..Default::default()
        },
        schedules,
        archive: Default::default(),
        safety: Default::default(),
        volumes: VolumesConfig {
            enabled: true,
            items,
            container_stop: None,
        },
        timezone: None,
    };

    let runtime = Arc::new(FakeRuntime::new());
    let remote_store = Arc::new(InMemoryObjectStore::new());
    let replicators: Vec<Arc<dyn Replicator>> = vec![
        Arc::new(LocalReplicator::new(local_root.path())),
        Arc::new(RemoteReplicator::new("bucket", "backups", remote_store.clone())),
    ];
    let ctx = AgentContext::with_parts(
        config,
        Database::open_in_memory().unwrap(),
        replicators,
        runtime.clone(),
    );

    Harness {
        ctx,
        runtime,
        remote_store,
        local_root,
    }
}

/// Volumes are backed up alongside files; one failing volume does not
/// abort the others.
#[tokio::test]
async fn each_volume_yields_its_own_artifact() {
    let h = harness(vec![volume_item("pgdata", false), volume_item("ghost", false)]);
    h.runtime.add_volume("pgdata");

    let outcome = run_backup(
        &h.ctx,
        "nightly",
        &BackupFlags {
            volumes_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(outcome.archive.is_none());
    assert_eq!(outcome.volumes.len(), 2);

    let ok = outcome.volumes.iter().find(|v| v.volume == "pgdata").unwrap();
    assert!(ok.error.is_none());
    assert!(ok.artifact_id.is_some());

    let failed = outcome.volumes.iter().find(|v| v.volume == "ghost").unwrap();
    assert!(failed.error.is_some());
    assert!(failed.artifact_id.is_none());

    let records = h.ctx.list_artifacts(None, Some(ArtifactKind::Volume)).unwrap();
    assert_eq!(records.len(), 1);
    match &records[0].detail {
        ArtifactDetail::Volume {
            volume_name,
            was_in_use,
        } => {
            assert_eq!(volume_name, "pgdata");
            assert!(!was_in_use);
        }
        _ => panic!("expected volume detail"),
    }
}

#[tokio::test]
async fn volume_artifacts_replicate_under_volumes_grouping() {
    let h = harness(vec![volume_item("pgdata", false)]);
    h.runtime.add_volume("pgdata");

    run_backup(
        &h.ctx,
        "nightly",
        &BackupFlags {
            volumes_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let record = &h.ctx.list_artifacts(None, Some(ArtifactKind::Volume)).unwrap()[0];
    let key = record.remote.key.as_deref().unwrap();
    assert!(key.starts_with("backups/volumes/pgdata/"), "{}", key);
    assert!(h.remote_store.get("bucket", key).is_some());

    // Local copy landed too, and the staging area went away with the run.
    let local = record.local.path.as_deref().unwrap();
    assert!(local.starts_with(h.local_root.path().to_str().unwrap()));
    assert!(std::path::Path::new(local).is_file());
}

#[tokio::test]
async fn quiesce_policy_flows_through_orchestrator() {
    let h = harness(vec![volume_item("pgdata", true)]);
    h.runtime.add_volume("pgdata");
    h.runtime.add_container("c1", "db", "pgdata", true, RestartPolicy::Always);

    let outcome = run_backup(
        &h.ctx,
        "nightly",
        &BackupFlags {
            volumes_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(h.runtime.stopped_ids(), vec!["c1"]);
    assert!(h.runtime.is_running("c1"));
    // The auto-restart policy warning is surfaced on the run.
    assert!(!outcome.warnings.is_empty());

    let record = &h.ctx.list_artifacts(None, Some(ArtifactKind::Volume)).unwrap()[0];
    match &record.detail {
        ArtifactDetail::Volume { was_in_use, .. } => assert!(was_in_use),
        _ => panic!("expected volume detail"),
    }
}

#[tokio::test]
async fn skip_volumes_and_subset_flags() {
    let h = harness(vec![volume_item("pgdata", false), volume_item("appdata", false)]);
    h.runtime.add_volume("pgdata");
    h.runtime.add_volume("appdata");

    let outcome = run_backup(
        &h.ctx,
        "nightly",
        &BackupFlags {
            volumes_only: true,
            skip_volumes: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(outcome.volumes.is_empty());

    let outcome = run_backup(
        &h.ctx,
        "nightly",
        &BackupFlags {
            volumes_only: true,
            volumes: Some(vec!["appdata".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome.volumes.len(), 1);
    assert_eq!(outcome.volumes[0].volume, "appdata");
}

#[tokio::test]
async fn volume_dry_run_touches_nothing() {
    let h = harness(vec![volume_item("pgdata", true)]);
    h.runtime.add_volume("pgdata");
    h.runtime.add_container("c1", "db", "pgdata", true, RestartPolicy::No);

    let outcome = run_backup(
        &h.ctx,
        "nightly",
        &BackupFlags {
            dry_run: true,
            volumes_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.volumes.len(), 1);
    assert!(outcome.volumes[0].filename.is_some());
    assert!(outcome.volumes[0].artifact_id.is_none());
    assert!(h.runtime.stopped_ids().is_empty());
    assert!(h.ctx.list_artifacts(None, None).unwrap().is_empty());
    assert!(h.remote_store.is_empty());
}
