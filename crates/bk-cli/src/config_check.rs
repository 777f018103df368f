//! `backitup config` commands.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

use bk_config::Config;
use bk_scheduler::CronExpr;

/// Configuration inspection commands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate the configuration, printing effective settings
    Check,
}

impl ConfigCommands {
    pub async fn run(self, config_path: &Path) -> Result<()> {
        match self {
            Self::Check => check(config_path),
        }
    }
}

fn check(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path).context("configuration is invalid")?;

    println!("configuration OK: {}", config_path.display());
    println!("  catalog: {}", config.database.path.display());
    if config.local.enabled {
        println!("  local destination: {}", config.local.path.display());
    }
    if config.remote.enabled {
        println!(
            "  remote destination: s3://{}/{}",
            config.remote.bucket,
            config.remote.prefix.as_deref().unwrap_or("")
        );
    }
    println!("  sources: {}", config.sources.len());
    for (name, source) in &config.sources {
        println!("    {} -> {}", name, source.path.display());
    }
    println!("  schedules: {}", config.schedules.len());
    for (name, schedule) in &config.schedules {
        // Full parse here surfaces cron errors at check time instead of
        // silently skipping the schedule when the daemon starts.
        match CronExpr::parse(&schedule.cron) {
            Ok(_) => println!(
                "    {} [{}] keep {} for {} days",
                name, schedule.cron, schedule.retention.max_count, schedule.retention.max_days
            ),
            Err(e) => println!("    {} INVALID: {}", name, e),
        }
    }
    if config.volumes.enabled {
        println!("  volumes: {}", config.volumes.items.len());
    }
    Ok(())
}
