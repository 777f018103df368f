//! Configuration error types.

use std::path::PathBuf;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config file extension: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Validation { message: String },

    #[error("Schedule '{schedule}' references unknown source '{source_name}'")]
    UnknownSource {
        schedule: String,
        source_name: String,
    },

    #[error("Remote storage is enabled but no credentials were found in config, S3_* or AWS_* environment")]
    MissingCredentials,
}

impl Error {
    /// Create a validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
