//! Error types for volume backup.

use std::path::PathBuf;

/// Error type for volume backup operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container runtime error: {message}")]
    Runtime { message: String },

    #[error("Volume not found: {name}")]
    VolumeNotFound { name: String },

    #[error("Compose file parse error at {}: {message}", .path.display())]
    ComposeParse { path: PathBuf, message: String },

    #[error("Service '{service}' declares no named volume in {}", .path.display())]
    ComposeServiceNotFound { service: String, path: PathBuf },

    #[error("Packing volume '{volume}' failed: {message}")]
    PackFailed { volume: String, message: String },

    #[error("Checksum error: {0}")]
    Checksum(#[from] bk_archive::Error),
}

impl Error {
    /// Create a container runtime error.
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Create a pack failure for the given volume.
    pub fn pack_failed<S: Into<String>>(volume: &str, message: S) -> Self {
        Self::PackFailed {
            volume: volume.to_string(),
            message: message.into(),
        }
    }
}
