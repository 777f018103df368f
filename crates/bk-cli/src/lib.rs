//! BackItUp agent CLI library.

pub mod backup;
pub mod cleanup;
pub mod config_check;
pub mod daemon;
pub mod list;
pub mod verify;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backitup")]
#[command(about = "Filesystem and container-volume backup agent")]
#[command(version, author, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (YAML or JSON)
    #[arg(short, long, global = true, default_value = "backitup.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one backup for a schedule
    Backup(backup::BackupArgs),
    /// Enforce retention for one schedule, or all of them
    Cleanup(cleanup::CleanupArgs),
    /// List active artifacts in the catalog
    List(list::ListArgs),
    /// Re-checksum local artifacts against the catalog
    Verify(verify::VerifyArgs),
    /// Run the cron dispatcher until interrupted
    Daemon(daemon::DaemonArgs),
    /// Configuration inspection commands
    Config {
        #[command(subcommand)]
        subcommand: config_check::ConfigCommands,
    },
}
