//! Backup and cleanup orchestration for the BackItUp agent.
//!
//! Ties the catalog, archive builders, replicators, and scheduler together:
//! an [`AgentContext`] owns the shared handles, [`backup::run_backup`]
//! drives archive construction and replication, and
//! [`cleanup::run_cleanup`] enforces retention behind the safety
//! validator's seven gates.

pub mod backup;
pub mod cleanup;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod retention;
pub mod safety;
pub mod verify;

/// Result type used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for orchestration.
pub use error::Error;

pub use backup::{run_backup, BackupFlags, BackupOutcome, FileBackupOutcome, VolumeOutcome};
pub use cleanup::{run_cleanup, run_cleanup_all, CleanupOutcome};
pub use context::AgentContext;
pub use pipeline::BackupPipeline;
pub use retention::{select_candidates, RetentionCandidate};
pub use safety::{is_path_within_dir, SafetyValidator, Verdict};
pub use verify::{verify_local, VerifyReport};
