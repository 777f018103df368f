//! `backitup backup` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

use bk_config::Config;
use bk_core::{run_backup, AgentContext, BackupFlags};

/// Arguments for a single backup run.
#[derive(Args)]
pub struct BackupArgs {
    /// Schedule to run
    #[arg(value_name = "SCHEDULE")]
    pub schedule: String,

    /// Compute everything, persist nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the remote destination
    #[arg(long, conflicts_with = "remote_only")]
    pub local_only: bool,

    /// Skip the local destination
    #[arg(long)]
    pub remote_only: bool,

    /// Back up volumes only, no file sources
    #[arg(long, conflicts_with = "skip_volumes")]
    pub volumes_only: bool,

    /// Skip volume backup
    #[arg(long)]
    pub skip_volumes: bool,

    /// Restrict volume backup to these configured items (repeatable)
    #[arg(long = "volume", value_name = "NAME")]
    pub volumes: Vec<String>,
}

impl BackupArgs {
    pub async fn run(self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path).context("loading configuration")?;
        let ctx = AgentContext::initialize(config).await.context("initializing agent")?;

        let flags = BackupFlags {
            dry_run: self.dry_run,
            local_only: self.local_only,
            remote_only: self.remote_only,
            volumes_only: self.volumes_only,
            skip_volumes: self.skip_volumes,
            volumes: (!self.volumes.is_empty()).then_some(self.volumes),
        };

        let outcome = run_backup(&ctx, &self.schedule, &flags).await?;

        if let Some(archive) = &outcome.archive {
            if self.dry_run {
                println!("dry run: would create {}", archive.filename);
            } else {
                println!(
                    "archived {} files into {} ({} bytes)",
                    archive.files_count, archive.filename, archive.size_bytes
                );
            }
            if let Some(path) = &archive.local_path {
                println!("  local:  {}", path);
            }
            if let Some(key) = &archive.remote_key {
                println!("  remote: {}", key);
            }
        }
        for volume in &outcome.volumes {
            match &volume.error {
                Some(error) => println!("volume {}: FAILED ({})", volume.volume, error),
                None => println!(
                    "volume {}: {}",
                    volume.volume,
                    volume.filename.as_deref().unwrap_or("-")
                ),
            }
        }
        for warning in &outcome.warnings {
            println!("warning: {}", warning);
        }
        println!("completed in {} ms", outcome.duration_ms);
        Ok(())
    }
}
