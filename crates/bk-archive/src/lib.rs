//! Archive construction for the BackItUp agent.
//!
//! Collects files from configured sources through include/exclude glob
//! composition, stages them without touching the originals, packs the
//! staged tree as gzip-compressed tar, and computes checksums. Also owns
//! the archive naming contract shared with the cleanup safety validator.

pub mod builder;
pub mod checksum;
pub mod collect;
pub mod error;
pub mod naming;
pub mod staging;

/// Result type used throughout the archive crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for archive construction.
pub use error::Error;

pub use builder::{ArchiveBuilder, ArchiveResult};
pub use checksum::sha256_file;
pub use collect::{collect_sources, CollectedFile, PatternSet};
pub use naming::{
    generate_archive_name, generate_volume_archive_name, parse_archive_name, sanitize_volume_name,
    short_id, ArchiveNameKind, ParsedArchiveName,
};
pub use staging::{staging_prefix, StagingDir};
