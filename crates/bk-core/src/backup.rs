//! The backup orchestrator: archive, replicate, catalog.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use bk_archive::{generate_volume_archive_name, ArchiveBuilder, ArchiveResult};
use bk_catalog::{ArtifactRecord, ArtifactStore};
use bk_config::SourceConfig;
use bk_storage::{build_remote_key, Replicator, ReplicatorKind, SavedLocation};
use bk_volumes::{effective_policy, VolumeBackup};

use crate::context::AgentContext;

/// Flags shaping one backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupFlags {
    /// Compute everything, mutate nothing.
    pub dry_run: bool,
    /// Skip the remote destination even when enabled.
    pub local_only: bool,
    /// Skip the local destination even when enabled.
    pub remote_only: bool,
    /// Back up volumes only, no file sources.
    pub volumes_only: bool,
    /// Skip volume backup even when enabled.
    pub skip_volumes: bool,
    /// Restrict volume backup to these configured item names.
    pub volumes: Option<Vec<String>>,
}

/// Outcome of the file-kind part of a run.
#[derive(Debug, Clone, Serialize)]
pub struct FileBackupOutcome {
    /// Catalog artifact id; absent on dry runs.
    pub artifact_id: Option<String>,
    pub filename: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub files_count: u32,
    /// Local destination path, actual or predicted.
    pub local_path: Option<String>,
    /// Remote object key, actual or predicted.
    pub remote_key: Option<String>,
}

/// Outcome of one volume in a run.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeOutcome {
    /// Configured item name, or the resolved volume name once known.
    pub volume: String,
    pub artifact_id: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

/// Aggregate result of one backup run.
#[derive(Debug, Clone, Serialize)]
pub struct BackupOutcome {
    pub schedule: String,
    pub archive: Option<FileBackupOutcome>,
    pub volumes: Vec<VolumeOutcome>,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
}

/// The source-grouping segment of the remote key: a single source's
/// explicit sub-prefix when it has one, else the source names joined with
/// `-`, else `all`.
pub fn source_grouping(sources: &[(String, SourceConfig)]) -> String {
    if sources.len() == 1 {
        if let Some(sub_prefix) = &sources[0].1.remote_sub_prefix {
            return sub_prefix.clone();
        }
    }
    if sources.is_empty() {
        "all".to_string()
    } else {
        sources.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join("-")
    }
}

/// Run one backup for a schedule.
pub async fn run_backup(
    ctx: &AgentContext,
    schedule: &str,
    flags: &BackupFlags,
) -> crate::Result<BackupOutcome> {
    let started = Instant::now();
    let config = ctx.config();

    if !config.schedules.contains_key(schedule) {
        return Err(crate::Error::unknown_schedule(schedule));
    }

    let use_local = config.local.enabled && !flags.remote_only;
    let use_remote = config.remote.enabled && !flags.local_only;
    if !use_local && !use_remote {
        return Err(crate::Error::NoDestinations);
    }
    let destinations: Vec<Arc<dyn Replicator>> = ctx
        .replicators()
        .iter()
        .filter(|r| match r.kind() {
            ReplicatorKind::Local => use_local,
            ReplicatorKind::Remote => use_remote,
        })
        .cloned()
        .collect();

    let mut warnings = Vec::new();

    let archive = if flags.volumes_only {
        None
    } else {
        Some(backup_files(ctx, schedule, flags, &destinations, use_local, use_remote).await?)
    };

    let volumes = if config.volumes.enabled && !flags.skip_volumes {
        backup_volumes(ctx, schedule, flags, &destinations, &mut warnings).await
    } else {
        Vec::new()
    };

    Ok(BackupOutcome {
        schedule: schedule.to_string(),
        archive,
        volumes,
        duration_ms: started.elapsed().as_millis() as u64,
        warnings,
    })
}

async fn backup_files(
    ctx: &AgentContext,
    schedule: &str,
    flags: &BackupFlags,
    destinations: &[Arc<dyn Replicator>],
    use_local: bool,
    use_remote: bool,
) -> crate::Result<FileBackupOutcome> {
    let config = ctx.config();
    let sources = config.sources_for_schedule(schedule);
    let grouping = source_grouping(&sources);

    // Archive construction is blocking tar/gzip work.
    let builder = ArchiveBuilder::new(&config.archive.prefix, config.archive.compression);
    let schedule_name = schedule.to_string();
    let build_sources = sources.clone();
    let archive: ArchiveResult = tokio::task::spawn_blocking(move || {
        builder.build(&schedule_name, &build_sources)
    })
    .await
    .map_err(|e| crate::Error::generic(format!("archive task panicked: {}", e)))??;

    if flags.dry_run {
        let outcome = FileBackupOutcome {
            artifact_id: None,
            filename: archive.filename.clone(),
            checksum: archive.checksum.clone(),
            size_bytes: archive.size_bytes,
            files_count: archive.files_count,
            local_path: use_local.then(|| {
                config.local.path.join(&archive.filename).to_string_lossy().into_owned()
            }),
            remote_key: use_remote.then(|| {
                build_remote_key(
                    config.remote.prefix.as_deref().unwrap_or(""),
                    &grouping,
                    &archive.filename,
                )
            }),
        };
        archive.cleanup()?;
        tracing::info!(schedule, "dry run complete, nothing persisted");
        return Ok(outcome);
    }

    let record = ArtifactRecord::new_files(
        schedule,
        &archive.filename,
        archive.size_bytes,
        &archive.checksum,
        archive.source_paths.clone(),
        archive.files_count,
    );
    let record = ctx
        .catalog()
        .with_conn(|conn| ArtifactStore::new(conn).insert(&record))?;

    match replicate(ctx, &record.artifact_id, &archive, &grouping, destinations).await {
        Ok(saved) => {
            let outcome = FileBackupOutcome {
                artifact_id: Some(record.artifact_id.clone()),
                filename: archive.filename.clone(),
                checksum: archive.checksum.clone(),
                size_bytes: archive.size_bytes,
                files_count: archive.files_count,
                local_path: saved
                    .iter()
                    .find(|s| s.kind == ReplicatorKind::Local)
                    .map(|s| s.location.clone()),
                remote_key: saved
                    .iter()
                    .find(|s| s.kind == ReplicatorKind::Remote)
                    .map(|s| s.location.clone()),
            };
            archive.cleanup()?;
            Ok(outcome)
        }
        Err((saved_any, e)) => {
            // The artifact must end up with at least one destination or not
            // exist at all.
            if !saved_any {
                ctx.catalog()
                    .with_conn(|conn| ArtifactStore::new(conn).remove(&record.artifact_id))?;
            }
            archive.cleanup()?;
            Err(e)
        }
    }
}

/// Save to each destination in order, recording locations in the catalog
/// as they land. On failure returns whether anything was saved first.
async fn replicate(
    ctx: &AgentContext,
    artifact_id: &str,
    archive: &ArchiveResult,
    grouping: &str,
    destinations: &[Arc<dyn Replicator>],
) -> std::result::Result<Vec<SavedLocation>, (bool, crate::Error)> {
    let mut saved = Vec::new();

    for replicator in destinations {
        let location = replicator
            .save(&archive.archive_path, &archive.filename, grouping)
            .await
            .map_err(|e| (!saved.is_empty(), crate::Error::from(e)))?;

        let update = ctx.catalog().with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            match (&location.kind, &location.bucket) {
                (ReplicatorKind::Local, _) => store.update_local(artifact_id, &location.location),
                (ReplicatorKind::Remote, Some(bucket)) => {
                    store.update_remote(artifact_id, bucket, &location.location)
                }
                (ReplicatorKind::Remote, None) => Err(bk_catalog::Error::generic(
                    "remote replicator returned no bucket",
                )),
            }
        });
        if let Err(e) = update {
            return Err((!saved.is_empty(), e.into()));
        }
        saved.push(location);
    }

    Ok(saved)
}

async fn backup_volumes(
    ctx: &AgentContext,
    schedule: &str,
    flags: &BackupFlags,
    destinations: &[Arc<dyn Replicator>],
    warnings: &mut Vec<String>,
) -> Vec<VolumeOutcome> {
    let config = ctx.config();
    let pipeline = VolumeBackup::new(ctx.runtime(), &config.archive.prefix);
    let mut outcomes = Vec::new();

    for item in &config.volumes.items {
        if let Some(subset) = &flags.volumes {
            if !subset.contains(&item.name) {
                continue;
            }
        }

        if flags.dry_run {
            let filename = generate_volume_archive_name(
                &config.archive.prefix,
                &item.name,
                schedule,
                chrono::Utc::now(),
            );
            outcomes.push(VolumeOutcome {
                volume: item.name.clone(),
                artifact_id: None,
                filename: Some(filename),
                error: None,
                warnings: Vec::new(),
            });
            continue;
        }

        let policy = effective_policy(
            config.volumes.container_stop.as_ref(),
            item.container_stop.as_ref(),
        );

        let staging = match bk_archive::StagingDir::create() {
            Ok(staging) => staging,
            Err(e) => {
                outcomes.push(VolumeOutcome {
                    volume: item.name.clone(),
                    artifact_id: None,
                    filename: None,
                    error: Some(e.to_string()),
                    warnings: Vec::new(),
                });
                continue;
            }
        };

        match pipeline.backup_volume(item, schedule, &policy, &staging).await {
            Ok(result) => {
                warnings.extend(result.warnings.iter().cloned());
                warnings.extend(
                    result.restart_failures.iter().map(|f| format!("restart failed: {}", f)),
                );

                let record = ArtifactRecord::new_volume(
                    schedule,
                    &result.filename,
                    result.size_bytes,
                    &result.checksum,
                    &result.volume_name,
                    result.was_in_use,
                );
                let outcome = persist_volume_artifact(
                    ctx,
                    record,
                    &result,
                    destinations,
                )
                .await;
                outcomes.push(outcome);
            }
            Err(e) => {
                tracing::error!(schedule, volume = %item.name, error = %e, "volume backup failed");
                outcomes.push(VolumeOutcome {
                    volume: item.name.clone(),
                    artifact_id: None,
                    filename: None,
                    error: Some(e.to_string()),
                    warnings: Vec::new(),
                });
            }
        }
    }

    outcomes
}

async fn persist_volume_artifact(
    ctx: &AgentContext,
    record: ArtifactRecord,
    result: &bk_volumes::VolumeBackupResult,
    destinations: &[Arc<dyn Replicator>],
) -> VolumeOutcome {
    let grouping = format!("volumes/{}", result.volume_name);

    let inserted = match ctx
        .catalog()
        .with_conn(|conn| ArtifactStore::new(conn).insert(&record))
    {
        Ok(inserted) => inserted,
        Err(e) => {
            return VolumeOutcome {
                volume: result.volume_name.clone(),
                artifact_id: None,
                filename: Some(result.filename.clone()),
                error: Some(e.to_string()),
                warnings: result.warnings.clone(),
            }
        }
    };

    let mut saved_any = false;
    for replicator in destinations {
        let save = replicator
            .save(&result.archive_path, &result.filename, &grouping)
            .await;
        let location = match save {
            Ok(location) => location,
            Err(e) => {
                tracing::error!(volume = %result.volume_name, error = %e, "volume artifact replication failed");
                if !saved_any {
                    let _ = ctx.catalog().with_conn(|conn| {
                        ArtifactStore::new(conn).remove(&inserted.artifact_id)
                    });
                }
                return VolumeOutcome {
                    volume: result.volume_name.clone(),
                    artifact_id: saved_any.then(|| inserted.artifact_id.clone()),
                    filename: Some(result.filename.clone()),
                    error: Some(e.to_string()),
                    warnings: result.warnings.clone(),
                };
            }
        };

        let update = ctx.catalog().with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            match (&location.kind, &location.bucket) {
                (ReplicatorKind::Local, _) => {
                    store.update_local(&inserted.artifact_id, &location.location)
                }
                (ReplicatorKind::Remote, Some(bucket)) => {
                    store.update_remote(&inserted.artifact_id, bucket, &location.location)
                }
                (ReplicatorKind::Remote, None) => Err(bk_catalog::Error::generic(
                    "remote replicator returned no bucket",
                )),
            }
        });
        if let Err(e) = update {
            return VolumeOutcome {
                volume: result.volume_name.clone(),
                artifact_id: Some(inserted.artifact_id.clone()),
                filename: Some(result.filename.clone()),
                error: Some(e.to_string()),
                warnings: result.warnings.clone(),
            };
        }
        saved_any = true;
    }

    VolumeOutcome {
        volume: result.volume_name.clone(),
        artifact_id: Some(inserted.artifact_id),
        filename: Some(result.filename.clone()),
        error: None,
        warnings: result.warnings.clone(),
    }
}
