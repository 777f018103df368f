//! Configuration structs consumed by the core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Effective agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,

    /// Named filesystem sources.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    /// Named schedules with their retention policies.
    #[serde(default)]
    pub schedules: BTreeMap<String, ScheduleConfig>,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub volumes: VolumesConfig,

    /// Default IANA timezone for schedules that do not specify one.
    /// Absent, schedules evaluate in local time.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Catalog store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// One named filesystem source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,

    /// Ordered glob patterns; a leading `!` marks an exclusion. Empty means
    /// include everything.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Overrides the source-grouping segment of the remote key when this
    /// source is backed up alone.
    #[serde(default)]
    pub remote_sub_prefix: Option<String>,
}

/// Local destination root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: PathBuf,
}

/// Remote object-storage destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

/// One named schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Five-field cron expression.
    pub cron: String,

    pub retention: RetentionConfig,

    /// Subset of source names this schedule backs up; absent means all.
    #[serde(default)]
    pub sources: Option<Vec<String>>,

    /// IANA timezone the cron expression evaluates in.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Per-schedule retention policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Keep at most this many artifacts. Must be at least 1.
    pub max_count: u32,
    /// Keep artifacts at most this many days. Must be at least 1.
    pub max_days: u32,
}

/// Archive construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Gzip compression level, 0-9.
    #[serde(default = "default_compression")]
    pub compression: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            compression: default_compression(),
        }
    }
}

fn default_prefix() -> String {
    "backitup".to_string()
}

fn default_compression() -> u32 {
    6
}

/// Cleanup safety settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub verify_checksum_before_delete: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            verify_checksum_before_delete: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Container volume backup settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumesConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub items: Vec<VolumeSourceConfig>,

    /// Global container-stop policy, overridable per item.
    #[serde(default)]
    pub container_stop: Option<ContainerStopConfig>,
}

/// How a configured volume item resolves to a concrete volume name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeSourceKind {
    /// `name` is a concrete volume name.
    Volume,
    /// `name` is a compose service whose volume is resolved through the
    /// compose file.
    ComposeService,
}

/// One configured volume source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSourceConfig {
    pub name: String,

    #[serde(default)]
    pub kind: Option<VolumeSourceKind>,

    /// Compose file the service reference resolves through.
    #[serde(default)]
    pub compose_file: Option<PathBuf>,

    /// Compose project name used for the `{project}_{name}` candidate.
    #[serde(default)]
    pub project: Option<String>,

    /// Per-item override of the container-stop policy.
    #[serde(default)]
    pub container_stop: Option<ContainerStopConfig>,
}

/// Container quiesce policy for volume backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStopConfig {
    /// Stop containers mounting the volume before packing.
    #[serde(default)]
    pub stop: bool,

    /// Graceful stop timeout in seconds.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u64,

    /// Restart attempts per container after packing.
    #[serde(default = "default_restart_retries")]
    pub restart_retries: u32,

    /// Delay between restart attempts, in milliseconds.
    #[serde(default = "default_restart_retry_delay")]
    pub restart_retry_delay: u64,
}

impl Default for ContainerStopConfig {
    fn default() -> Self {
        Self {
            stop: false,
            stop_timeout: default_stop_timeout(),
            restart_retries: default_restart_retries(),
            restart_retry_delay: default_restart_retry_delay(),
        }
    }
}

fn default_stop_timeout() -> u64 {
    30
}

fn default_restart_retries() -> u32 {
    3
}

fn default_restart_retry_delay() -> u64 {
    1000
}

/// Resolved remote credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}
