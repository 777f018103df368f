//! Scheduler error types.

/// Error type for cron parsing and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error("Unknown timezone '{zone}'")]
    InvalidTimezone { zone: String },
}

impl Error {
    /// Create an invalid-cron error.
    pub fn invalid_cron<E: Into<String>, M: Into<String>>(expr: E, message: M) -> Self {
        Self::InvalidCron {
            expr: expr.into(),
            message: message.into(),
        }
    }
}
