//! The quiesce-and-pack volume backup pipeline.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bk_archive::{generate_volume_archive_name, sha256_file, StagingDir};
use bk_config::{ContainerStopConfig, VolumeSourceConfig, VolumeSourceKind};

use crate::compose;
use crate::runtime::{ContainerInfo, ContainerRuntime};

/// Image used for the throwaway packing container.
pub const DEFAULT_PACK_IMAGE: &str = "alpine:3.20";

/// Outcome of backing up one volume.
#[derive(Debug)]
pub struct VolumeBackupResult {
    /// Concrete volume name after compose resolution.
    pub volume_name: String,
    /// Archive path inside the staging directory.
    pub archive_path: PathBuf,
    pub filename: String,
    pub checksum: String,
    pub size_bytes: u64,
    /// Whether any running container mounted the volume at capture time.
    pub was_in_use: bool,
    /// Non-fatal observations, e.g. stopped containers with auto-restart
    /// policies.
    pub warnings: Vec<String>,
    /// Containers that could not be restarted after packing.
    pub restart_failures: Vec<String>,
}

/// Effective per-volume container-stop policy: the per-source override when
/// present, else the global policy, else defaults.
pub fn effective_policy(
    global: Option<&ContainerStopConfig>,
    item: Option<&ContainerStopConfig>,
) -> ContainerStopConfig {
    item.or(global).copied().unwrap_or_default()
}

/// Captures named volumes into tar.gz archives through a container runtime.
pub struct VolumeBackup {
    runtime: Arc<dyn ContainerRuntime>,
    prefix: String,
    image: String,
}

impl VolumeBackup {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, prefix: &str) -> Self {
        Self {
            runtime,
            prefix: prefix.to_string(),
            image: DEFAULT_PACK_IMAGE.to_string(),
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    /// Resolve a configured volume source to a concrete volume name.
    ///
    /// Compose-service references resolve through the compose file, trying
    /// `{project}_{volume}` then the raw volume name until one exists.
    pub async fn resolve_volume_name(&self, item: &VolumeSourceConfig) -> crate::Result<String> {
        if item.kind != Some(VolumeSourceKind::ComposeService) {
            return Ok(item.name.clone());
        }

        let compose_path = item.compose_file.as_deref().ok_or_else(|| {
            crate::Error::runtime(format!(
                "volume source '{}' is a compose service but has no compose_file",
                item.name
            ))
        })?;
        let raw = compose::service_volume(compose_path, &item.name)?;

        let mut candidates = Vec::new();
        if let Some(project) = compose::project_name(compose_path, item.project.as_deref()) {
            candidates.push(format!("{}_{}", project, raw));
        }
        candidates.push(raw.clone());

        for candidate in &candidates {
            if self.runtime.volume_exists(candidate).await? {
                return Ok(candidate.clone());
            }
        }
        Err(crate::Error::VolumeNotFound { name: raw })
    }

    /// Back up one volume into the staging directory.
    ///
    /// Stopped containers are always restarted, with bounded retry, whether
    /// or not the pack succeeded; restart failures are recorded on the
    /// result rather than raised.
    pub async fn backup_volume(
        &self,
        item: &VolumeSourceConfig,
        schedule: &str,
        policy: &ContainerStopConfig,
        staging: &StagingDir,
    ) -> crate::Result<VolumeBackupResult> {
        let volume_name = self.resolve_volume_name(item).await?;
        if !self.runtime.volume_exists(&volume_name).await? {
            return Err(crate::Error::VolumeNotFound { name: volume_name });
        }

        let containers = self.runtime.containers_using_volume(&volume_name).await?;
        let was_in_use = containers.iter().any(|c| c.running);

        let mut warnings = Vec::new();
        let mut stopped: Vec<ContainerInfo> = Vec::new();
        if policy.stop {
            for container in containers.iter().filter(|c| c.running) {
                let restart = self.runtime.restart_policy(&container.id).await?;
                if restart.auto_restarts() {
                    warnings.push(format!(
                        "container {} has restart policy that may bring it back during packing",
                        container.name
                    ));
                }
                tracing::info!(container = %container.name, volume = %volume_name, "stopping container for volume backup");
                self.runtime.stop_container(&container.id, policy.stop_timeout).await?;
                stopped.push(container.clone());
            }
        }

        let filename =
            generate_volume_archive_name(&self.prefix, &volume_name, schedule, Utc::now());
        let command = vec![
            "tar".to_string(),
            "czf".to_string(),
            format!("/staging/{}", filename),
            "-C".to_string(),
            "/volume".to_string(),
            ".".to_string(),
        ];
        let pack_result = self
            .runtime
            .run_disposable(&self.image, &volume_name, staging.path(), &command)
            .await;

        let restart_failures = self.restart_all(&stopped, policy).await;

        if let Err(e) = pack_result {
            for failure in &restart_failures {
                tracing::error!(volume = %volume_name, %failure, "restart failure after failed pack");
            }
            return Err(crate::Error::pack_failed(&volume_name, e.to_string()));
        }

        let archive_path = staging.path().join(&filename);
        let checksum = sha256_file(&archive_path)?;
        let size_bytes = std::fs::metadata(&archive_path)?.len();

        tracing::info!(volume = %volume_name, %filename, size_bytes, "volume archive built");
        Ok(VolumeBackupResult {
            volume_name,
            archive_path,
            filename,
            checksum,
            size_bytes,
            was_in_use,
            warnings,
            restart_failures,
        })
    }

    /// Restart every stopped container with bounded retry. Failures are
    /// collected, never raised.
    async fn restart_all(
        &self,
        stopped: &[ContainerInfo],
        policy: &ContainerStopConfig,
    ) -> Vec<String> {
        let mut failures = Vec::new();
        let attempts = policy.restart_retries.max(1);

        for container in stopped {
            let mut last_error = None;
            for attempt in 1..=attempts {
                match self.runtime.start_container(&container.id).await {
                    Ok(()) => {
                        last_error = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            container = %container.name,
                            attempt,
                            error = %e,
                            "container restart attempt failed"
                        );
                        last_error = Some(e);
                        if attempt < attempts {
                            tokio::time::sleep(Duration::from_millis(policy.restart_retry_delay))
                                .await;
                        }
                    }
                }
            }
            if let Some(e) = last_error {
                failures.push(format!("{}: {}", container.name, e));
            }
        }
        failures
    }
}
