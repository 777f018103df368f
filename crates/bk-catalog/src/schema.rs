//! Schema constants.

/// Version the migration list must reach.
pub const SCHEMA_VERSION: u32 = 2;

pub const TABLE_SCHEMA_VERSION: &str = "schema_version";
pub const TABLE_BACKUPS: &str = "backups";
pub const TABLE_DELETION_LOG: &str = "deletion_log";
