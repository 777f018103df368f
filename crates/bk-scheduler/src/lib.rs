//! Cron parsing and minute-granularity dispatch for the BackItUp agent.
//!
//! The cron grammar is implemented directly rather than through a library:
//! it is small and well-specified, timezone handling stays explicit, and
//! there are no surprise semantics from `L`/`#` extensions.

pub mod cron;
pub mod dispatcher;
pub mod error;

/// Result type used throughout the scheduler crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for cron parsing and dispatch.
pub use error::Error;

pub use cron::CronExpr;
pub use dispatcher::{
    build_entries, PipelineRunner, ScheduleEntry, Scheduler, SchedulerState,
};
