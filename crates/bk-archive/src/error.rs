//! Error types for archive construction.

use std::path::PathBuf;

/// Error type for archive construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("No files collected, refusing to write an empty archive")]
    EmptyArchive,

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Refusing to remove {}: outside the agent staging prefix", .path.display())]
    StagingEscape { path: PathBuf },

    #[error("Archive error: {message}")]
    Generic { message: String },
}

impl Error {
    /// Create a pattern error.
    pub fn pattern<S: Into<String>, M: Into<String>>(pattern: S, message: M) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a generic archive error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}
