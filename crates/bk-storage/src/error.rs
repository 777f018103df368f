//! Error types for storage replication.

use std::path::PathBuf;

/// Error type for storage replication.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch after copy to {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Object store error: {message}")]
    Backend { message: String },

    #[error("Uploaded object not found on verification: {location}")]
    VerificationFailed { location: String },

    #[error("Checksum error: {0}")]
    Checksum(#[from] bk_archive::Error),

    #[error(transparent)]
    Credentials(#[from] bk_config::Error),
}

impl Error {
    /// Create a backend error.
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
