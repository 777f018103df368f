//! Container volume backup for the BackItUp agent.
//!
//! Captures named volumes into tar.gz archives without mounting them into
//! the agent's filesystem: a throwaway container mounts the volume
//! read-only and the staging directory read-write and packs from one to
//! the other. Containers using the volume can optionally be quiesced for
//! the duration and are always restarted afterwards.

pub mod backup;
pub mod compose;
pub mod error;
pub mod runtime;
pub mod testing;

/// Result type used throughout the volumes crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for volume backup operations.
pub use error::Error;

pub use backup::{effective_policy, VolumeBackup, VolumeBackupResult, DEFAULT_PACK_IMAGE};
pub use runtime::{ContainerInfo, ContainerRuntime, DockerCli, RestartPolicy};
