//! `backitup cleanup` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::Path;

use bk_config::Config;
use bk_core::{run_cleanup, run_cleanup_all, AgentContext, CleanupOutcome};

/// Arguments for retention cleanup.
#[derive(Args)]
pub struct CleanupArgs {
    /// Schedule to clean
    #[arg(value_name = "SCHEDULE", required_unless_present = "all")]
    pub schedule: Option<String>,

    /// Clean every configured schedule
    #[arg(long, conflicts_with = "schedule")]
    pub all: bool,

    /// Report what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

impl CleanupArgs {
    pub async fn run(self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path).context("loading configuration")?;
        let ctx = AgentContext::initialize(config).await.context("initializing agent")?;

        let outcomes = if self.all {
            run_cleanup_all(&ctx, self.dry_run).await?
        } else {
            let Some(schedule) = self.schedule else {
                bail!("a schedule name or --all is required");
            };
            vec![run_cleanup(&ctx, &schedule, self.dry_run).await?]
        };

        for outcome in &outcomes {
            print_outcome(outcome, self.dry_run);
        }
        Ok(())
    }
}

fn print_outcome(outcome: &CleanupOutcome, dry_run: bool) {
    if dry_run {
        println!(
            "{}: examined {}, would delete {}",
            outcome.schedule,
            outcome.examined,
            outcome.would_delete.len()
        );
        for id in &outcome.would_delete {
            println!("  would delete {}", id);
        }
    } else {
        println!(
            "{}: examined {}, deleted {}, skipped {}, errors {}",
            outcome.schedule,
            outcome.examined,
            outcome.deleted.len(),
            outcome.skipped.len(),
            outcome.errors.len()
        );
        for (id, reason) in &outcome.skipped {
            println!("  skipped {}: {}", id, reason);
        }
        for (id, error) in &outcome.errors {
            println!("  failed {}: {}", id, error);
        }
    }
}
