//! SQLite artifact catalog for the BackItUp agent.
//!
//! The catalog is the single source of truth for every backup artifact the
//! agent has produced: its archive filename, size, checksum, storage
//! locations, and deletion lifecycle. It also keeps an append-only deletion
//! log and migrates its own schema forward at open time.

pub mod connection;
pub mod error;
pub mod migrations;
pub mod models;
pub mod schema;

/// Result type used throughout the catalog crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for catalog operations.
pub use error::Error;

/// Catalog database handle.
pub use connection::Database;

/// Schema migration management.
pub use migrations::MigrationManager;

/// Record models and table stores.
pub use models::{
    ArtifactDetail, ArtifactKind, ArtifactRecord, ArtifactStatus, ArtifactStore, DeletionLogEntry,
    DeletionLogStore, DeletionReason, DeletionTarget, LocalDestination, RemoteDestination,
};
