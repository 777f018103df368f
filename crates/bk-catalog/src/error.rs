//! Error types for catalog operations.

use std::path::PathBuf;

/// Error type for catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Artifact not found: {artifact_id}")]
    NotFound { artifact_id: String },

    #[error("Migration to version {version} failed, store restored from backup: {message}")]
    MigrationRollback { version: u32, message: String },

    #[error("Catalog store is corrupt at {}: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Invalid {column} value in catalog row: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("Catalog error: {message}")]
    Generic { message: String },
}

impl Error {
    /// Create a not-found error for the given artifact id.
    pub fn not_found<S: Into<String>>(artifact_id: S) -> Self {
        Self::NotFound {
            artifact_id: artifact_id.into(),
        }
    }

    /// Create a migration rollback error.
    pub fn migration_rollback<S: Into<String>>(version: u32, message: S) -> Self {
        Self::MigrationRollback {
            version,
            message: message.into(),
        }
    }

    /// Create an invalid-column-value error.
    pub fn invalid_value<S: Into<String>>(column: &'static str, value: S) -> Self {
        Self::InvalidValue {
            column,
            value: value.into(),
        }
    }

    /// Create a generic catalog error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}
