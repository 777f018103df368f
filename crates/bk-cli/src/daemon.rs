//! `backitup daemon` command: run the dispatcher until interrupted.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bk_config::Config;
use bk_core::{AgentContext, BackupPipeline};
use bk_scheduler::{build_entries, Scheduler};

/// How long a stop waits for in-flight pipelines before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Arguments for the daemon.
#[derive(Args)]
pub struct DaemonArgs {}

impl DaemonArgs {
    pub async fn run(self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path).context("loading configuration")?;

        let default_zone = match &config.timezone {
            Some(zone) => Some(
                bk_config::parse_timezone(zone).context("parsing default timezone")?,
            ),
            None => None,
        };
        let entries = build_entries(
            config.schedules.clone().into_iter(),
            default_zone,
        );
        if entries.is_empty() {
            tracing::warn!("no valid schedules configured, daemon has nothing to do");
        }

        let ctx = Arc::new(AgentContext::initialize(config).await.context("initializing agent")?);
        let scheduler = Scheduler::new(entries, Arc::new(BackupPipeline::new(ctx)));

        let loop_handle = tokio::spawn(scheduler.clone().start());
        tracing::info!("daemon running, press Ctrl+C to stop");

        wait_for_shutdown_signal().await;
        tracing::info!("stop requested, draining in-flight pipelines");
        scheduler.stop();
        loop_handle.await.ok();

        if !scheduler.drain(DRAIN_TIMEOUT).await {
            tracing::warn!("drain timed out, exiting with pipelines still running");
        }
        Ok(())
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
