//! The backup-then-cleanup pipeline the dispatcher fires.

use async_trait::async_trait;
use std::sync::Arc;

use bk_scheduler::PipelineRunner;

use crate::backup::{run_backup, BackupFlags};
use crate::cleanup::run_cleanup;
use crate::context::AgentContext;

/// Runs a full backup followed by retention cleanup for one schedule.
pub struct BackupPipeline {
    ctx: Arc<AgentContext>,
}

impl BackupPipeline {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PipelineRunner for BackupPipeline {
    async fn run(&self, schedule: &str) {
        match run_backup(&self.ctx, schedule, &BackupFlags::default()).await {
            Ok(outcome) => {
                tracing::info!(
                    schedule,
                    duration_ms = outcome.duration_ms,
                    volumes = outcome.volumes.len(),
                    "scheduled backup complete"
                );
            }
            Err(e) => {
                tracing::error!(schedule, error = %e, "scheduled backup failed");
                // Cleanup still runs: retention is enforced even when this
                // firing produced nothing.
            }
        }

        match run_cleanup(&self.ctx, schedule, false).await {
            Ok(outcome) => {
                tracing::info!(
                    schedule,
                    deleted = outcome.deleted.len(),
                    skipped = outcome.skipped.len(),
                    "scheduled cleanup complete"
                );
            }
            Err(e) => {
                tracing::error!(schedule, error = %e, "scheduled cleanup failed");
            }
        }
    }
}
