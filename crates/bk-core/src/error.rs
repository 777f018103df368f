//! Core error type aggregating the subsystem errors.

/// Error type for orchestration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] bk_config::Error),

    #[error(transparent)]
    Catalog(#[from] bk_catalog::Error),

    #[error(transparent)]
    Archive(#[from] bk_archive::Error),

    #[error(transparent)]
    Storage(#[from] bk_storage::Error),

    #[error(transparent)]
    Volume(#[from] bk_volumes::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No destination enabled for this run")]
    NoDestinations,

    #[error("Unknown schedule: {name}")]
    UnknownSchedule { name: String },

    #[error("{message}")]
    Generic { message: String },
}

impl Error {
    /// Create an unknown-schedule error.
    pub fn unknown_schedule<S: Into<String>>(name: S) -> Self {
        Self::UnknownSchedule { name: name.into() }
    }

    /// Create a generic orchestration error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}
