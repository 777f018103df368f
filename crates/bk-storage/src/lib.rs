//! Storage replicators for the BackItUp agent.
//!
//! Two interchangeable implementations of one capability contract: a local
//! directory and a remote object store. Orchestrators hold an ordered list
//! of replicators and iterate; nothing above this crate knows which backend
//! it is talking to.

use async_trait::async_trait;
use std::path::Path;

pub mod error;
pub mod keys;
pub mod local;
pub mod memory;
pub mod object_store;
pub mod remote;

/// Result type used throughout the storage crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for storage replication.
pub use error::Error;

pub use keys::build_remote_key;
pub use local::LocalReplicator;
pub use memory::InMemoryObjectStore;
pub use object_store::{ObjectStoreClient, S3ObjectStore};
pub use remote::RemoteReplicator;

/// Which backend a replicator writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatorKind {
    Local,
    Remote,
}

/// Where a save landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedLocation {
    pub kind: ReplicatorKind,
    /// Destination-defined address: an absolute path for the local backend,
    /// an object key for the remote backend.
    pub location: String,
    /// Bucket the object landed in; remote backend only.
    pub bucket: Option<String>,
    /// Post-copy checksum, when the backend exposes one.
    pub checksum: Option<String>,
}

/// Outcome of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The object was already gone; deletes are idempotent.
    AlreadyMissing,
}

/// Capability contract shared by the local and remote backends.
#[async_trait]
pub trait Replicator: Send + Sync {
    fn kind(&self) -> ReplicatorKind;

    /// Store the archive bytes at a destination-defined address. `grouping`
    /// is the source-grouping segment of the remote key; the local backend
    /// ignores it.
    async fn save(
        &self,
        source_path: &Path,
        archive_name: &str,
        grouping: &str,
    ) -> Result<SavedLocation>;

    /// Delete the object at `location`. Idempotent: a missing object is a
    /// warning, not an error.
    async fn delete(&self, location: &str) -> Result<DeleteOutcome>;

    /// Whether an object currently exists at `location`.
    async fn exists(&self, location: &str) -> Result<bool>;

    /// Checksum of the stored object, when the backend can produce one.
    async fn checksum(&self, location: &str) -> Result<Option<String>>;
}
