//! `backitup list` command.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::Path;

use bk_catalog::{ArtifactDetail, ArtifactKind};
use bk_config::Config;
use bk_core::AgentContext;

#[derive(Clone, Copy, ValueEnum)]
pub enum KindFilter {
    Files,
    Volume,
}

/// Arguments for listing catalog artifacts.
#[derive(Args)]
pub struct ListArgs {
    /// Restrict to one schedule
    #[arg(long, value_name = "SCHEDULE")]
    pub schedule: Option<String>,

    /// Restrict to one artifact kind
    #[arg(long, value_enum)]
    pub kind: Option<KindFilter>,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub async fn run(self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path).context("loading configuration")?;
        let ctx = AgentContext::initialize(config).await.context("initializing agent")?;

        let kind = self.kind.map(|k| match k {
            KindFilter::Files => ArtifactKind::Files,
            KindFilter::Volume => ArtifactKind::Volume,
        });
        let records = ctx.list_artifacts(self.schedule.as_deref(), kind)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            return Ok(());
        }

        if records.is_empty() {
            println!("no active artifacts");
            return Ok(());
        }
        for record in &records {
            let detail = match &record.detail {
                ArtifactDetail::Files { files_count, .. } => format!("{} files", files_count),
                ArtifactDetail::Volume { volume_name, .. } => format!("volume {}", volume_name),
            };
            let destinations = match (record.local.path.is_some(), record.remote.key.is_some()) {
                (true, true) => "local+remote",
                (true, false) => "local",
                (false, true) => "remote",
                (false, false) => "-",
            };
            println!(
                "{}  {}  {:>12}B  {}  {}  {}",
                record.created_at,
                record.schedule,
                record.size_bytes,
                detail,
                destinations,
                record.filename
            );
        }
        Ok(())
    }
}
