//! The cleanup orchestrator: select, validate, delete, record.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use bk_catalog::{
    ArtifactRecord, ArtifactStore, DeletionLogEntry, DeletionLogStore, DeletionReason,
    DeletionTarget,
};
use bk_storage::{Replicator, ReplicatorKind};

use crate::context::AgentContext;
use crate::retention::{select_candidates, RetentionCandidate};
use crate::safety::{SafetyValidator, Verdict};

/// Aggregate result of cleaning one schedule.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub schedule: String,
    /// Active artifacts examined.
    pub examined: usize,
    /// Artifact ids fully deleted this run.
    pub deleted: Vec<String>,
    /// Artifact ids a dry run would have deleted.
    pub would_delete: Vec<String>,
    /// Artifact ids skipped by the safety validator, with the gate reason.
    pub skipped: Vec<(String, String)>,
    /// Artifact ids whose deletion failed mid-way, with the error.
    pub errors: Vec<(String, String)>,
}

/// Clean every configured schedule in turn.
pub async fn run_cleanup_all(
    ctx: &AgentContext,
    dry_run: bool,
) -> crate::Result<Vec<CleanupOutcome>> {
    let schedules: Vec<String> = ctx.config().schedules.keys().cloned().collect();
    let mut outcomes = Vec::new();
    for schedule in schedules {
        outcomes.push(run_cleanup(ctx, &schedule, dry_run).await?);
    }
    Ok(outcomes)
}

/// Clean one schedule: select candidates by retention, validate each, and
/// delete per destination with catalog accounting.
pub async fn run_cleanup(
    ctx: &AgentContext,
    schedule: &str,
    dry_run: bool,
) -> crate::Result<CleanupOutcome> {
    let config = ctx.config();
    let retention = config
        .schedules
        .get(schedule)
        .ok_or_else(|| crate::Error::unknown_schedule(schedule))?
        .retention;

    let records = ctx
        .catalog()
        .with_conn(|conn| ArtifactStore::new(conn).list_active_by_schedule(schedule))?;
    let examined = records.len();
    let candidates = select_candidates(&records, &retention, Utc::now());
    tracing::info!(
        schedule,
        examined,
        candidates = candidates.len(),
        "retention selection complete"
    );

    let validator = SafetyValidator::new(
        config,
        ctx.catalog().clone(),
        ctx.replicator(ReplicatorKind::Remote),
    );

    let mut outcome = CleanupOutcome {
        schedule: schedule.to_string(),
        examined,
        deleted: Vec::new(),
        would_delete: Vec::new(),
        skipped: Vec::new(),
        errors: Vec::new(),
    };

    for candidate in candidates {
        process_candidate(ctx, &validator, &candidate, dry_run, &mut outcome).await?;
    }

    Ok(outcome)
}

async fn process_candidate(
    ctx: &AgentContext,
    validator: &SafetyValidator,
    candidate: &RetentionCandidate,
    dry_run: bool,
    outcome: &mut CleanupOutcome,
) -> crate::Result<()> {
    let artifact_id = candidate.record.artifact_id.clone();

    match validator.validate(&artifact_id).await? {
        Verdict::Rejected { gate, reason } => {
            tracing::warn!(%artifact_id, gate, %reason, "deletion candidate rejected");
            if !dry_run {
                append_log(ctx, &candidate.record, candidate.reason, false, Some(&reason))?;
            }
            outcome.skipped.push((artifact_id, reason));
            return Ok(());
        }
        Verdict::Valid { warnings } => {
            for warning in warnings {
                tracing::warn!(%artifact_id, %warning, "cleanup warning");
            }
        }
    }

    if dry_run {
        tracing::info!(%artifact_id, reason = candidate.reason.as_str(), "would delete");
        outcome.would_delete.push(artifact_id);
        return Ok(());
    }

    // Work from the freshly validated state, not the listing snapshot.
    let Some(record) = ctx.get_artifact(&artifact_id)? else {
        outcome.skipped.push((artifact_id, "record vanished mid-cleanup".to_string()));
        return Ok(());
    };

    let live_local = record.local.deleted_at.is_none() && record.local.path.is_some();
    let live_remote = record.remote.deleted_at.is_none() && record.remote.key.is_some();
    if !live_local && !live_remote {
        outcome
            .skipped
            .push((artifact_id, "no live destinations to delete".to_string()));
        return Ok(());
    }

    if live_local {
        let location = record.local.path.clone().unwrap_or_default();
        if let Err(e) = delete_destination(
            ctx,
            ctx.replicator(ReplicatorKind::Local),
            &location,
            &artifact_id,
            DeletionTarget::Local,
        )
        .await
        {
            tracing::error!(%artifact_id, error = %e, "local deletion failed");
            append_log(ctx, &record, candidate.reason, false, Some(&e))?;
            outcome.errors.push((artifact_id, e));
            return Ok(());
        }
    }

    if live_remote {
        let location = record.remote.key.clone().unwrap_or_default();
        if let Err(e) = delete_destination(
            ctx,
            ctx.replicator(ReplicatorKind::Remote),
            &location,
            &artifact_id,
            DeletionTarget::Remote,
        )
        .await
        {
            tracing::error!(%artifact_id, error = %e, "remote deletion failed");
            append_log(ctx, &record, candidate.reason, false, Some(&e))?;
            outcome.errors.push((artifact_id, e));
            return Ok(());
        }
    }

    append_log(ctx, &record, candidate.reason, true, None)?;
    tracing::info!(%artifact_id, reason = candidate.reason.as_str(), "artifact deleted");
    outcome.deleted.push(artifact_id);
    Ok(())
}

/// Delete one destination's object and stamp the catalog. A missing object
/// counts as already deleted; the stamp still happens.
async fn delete_destination(
    ctx: &AgentContext,
    replicator: Option<Arc<dyn Replicator>>,
    location: &str,
    artifact_id: &str,
    which: DeletionTarget,
) -> std::result::Result<(), String> {
    let Some(replicator) = replicator else {
        return Err(format!("no {} replicator configured", which.as_str()));
    };

    let exists = replicator.exists(location).await.map_err(|e| e.to_string())?;
    if exists {
        replicator.delete(location).await.map_err(|e| e.to_string())?;
    } else {
        tracing::warn!(location, "object already missing, stamping as deleted");
    }

    ctx.catalog()
        .transaction(|conn| ArtifactStore::new(conn).mark_deleted(artifact_id, which))
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn append_log(
    ctx: &AgentContext,
    record: &ArtifactRecord,
    reason: DeletionReason,
    success: bool,
    error: Option<&str>,
) -> crate::Result<()> {
    let live_local = record.local.deleted_at.is_none() && record.local.path.is_some();
    let live_remote = record.remote.deleted_at.is_none() && record.remote.key.is_some();
    let targets = match (live_local, live_remote) {
        (true, true) => DeletionTarget::Both,
        (false, true) => DeletionTarget::Remote,
        // Local-only, and the fallback for records with nothing live left.
        _ => DeletionTarget::Local,
    };

    let entry = DeletionLogEntry::new(
        &record.artifact_id,
        targets,
        record.local.path.clone(),
        record.remote.key.clone(),
        reason,
        success,
        error.map(|e| e.to_string()),
    );
    ctx.catalog()
        .with_conn(|conn| DeletionLogStore::new(conn).append(&entry))?;
    Ok(())
}
