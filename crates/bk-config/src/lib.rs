//! Configuration model, loading, and validation for the BackItUp agent.
//!
//! The core consumes configuration as plain structs; this crate owns their
//! shape, the YAML/JSON file loader, semantic validation, and the remote
//! credential fallback chain.

pub mod error;
pub mod load;
pub mod model;

/// Result type used throughout the config crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for configuration loading and validation.
pub use error::Error;

pub use load::{parse_timezone, resolve_credentials};
pub use model::{
    ArchiveConfig, Config, ContainerStopConfig, Credentials, DatabaseConfig, LocalConfig,
    RemoteConfig, RetentionConfig, SafetyConfig, ScheduleConfig, SourceConfig, VolumeSourceConfig,
    VolumeSourceKind, VolumesConfig,
};
