//! `backitup verify` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::Path;

use bk_config::Config;
use bk_core::{verify_local, AgentContext};

/// Arguments for local artifact verification.
#[derive(Args)]
pub struct VerifyArgs {
    /// Restrict to one schedule
    #[arg(long, value_name = "SCHEDULE")]
    pub schedule: Option<String>,
}

impl VerifyArgs {
    pub async fn run(self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path).context("loading configuration")?;
        let ctx = AgentContext::initialize(config).await.context("initializing agent")?;

        let report = verify_local(&ctx, self.schedule.as_deref()).await?;
        println!(
            "checked {}: {} ok, {} mismatched, {} missing",
            report.checked,
            report.ok,
            report.mismatched.len(),
            report.missing.len()
        );
        for id in &report.mismatched {
            println!("  mismatched {}", id);
        }
        for id in &report.missing {
            println!("  missing {}", id);
        }

        if !report.mismatched.is_empty() {
            bail!("{} artifact(s) failed verification", report.mismatched.len());
        }
        Ok(())
    }
}
