//! Container runtime contract and the docker CLI implementation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// A container observed mounting a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub running: bool,
}

/// Restart policy of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
    UnlessStopped,
    No,
    Other,
}

impl RestartPolicy {
    /// Policies that bring a container back up on their own; stopping such
    /// a container is worth a warning.
    pub fn auto_restarts(&self) -> bool {
        matches!(self, Self::Always | Self::UnlessStopped)
    }

    fn parse(value: &str) -> Self {
        match value {
            "always" => Self::Always,
            "unless-stopped" => Self::UnlessStopped,
            "" | "no" => Self::No,
            _ => Self::Other,
        }
    }
}

/// Runtime surface the volume pipeline depends on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether a volume with this exact name exists.
    async fn volume_exists(&self, name: &str) -> crate::Result<bool>;

    /// Containers that mount the volume, running or not.
    async fn containers_using_volume(&self, name: &str) -> crate::Result<Vec<ContainerInfo>>;

    /// Gracefully stop a container, killing it after `timeout_secs`.
    async fn stop_container(&self, id: &str, timeout_secs: u64) -> crate::Result<()>;

    /// Start a previously stopped container.
    async fn start_container(&self, id: &str) -> crate::Result<()>;

    /// The container's configured restart policy.
    async fn restart_policy(&self, id: &str) -> crate::Result<RestartPolicy>;

    /// Run a throwaway container that mounts `volume` read-only at
    /// `/volume` and `staging` read-write at `/staging`, executing
    /// `command`. The container is removed when the command exits.
    async fn run_disposable(
        &self,
        image: &str,
        volume: &str,
        staging: &Path,
        command: &[String],
    ) -> crate::Result<()>;
}

/// Docker CLI implementation of [`ContainerRuntime`].
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    /// Use a different binary, e.g. `podman`.
    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    async fn run_quiet(&self, args: &[&str]) -> crate::Result<bool> {
        let status = Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| crate::Error::runtime(format!("failed to spawn {}: {}", self.binary, e)))?;
        Ok(status.success())
    }

    async fn run_captured(&self, args: &[&str]) -> crate::Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| crate::Error::runtime(format!("failed to spawn {}: {}", self.binary, e)))?;
        if !output.status.success() {
            return Err(crate::Error::runtime(format!(
                "{} {} failed: {}",
                self.binary,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn volume_exists(&self, name: &str) -> crate::Result<bool> {
        self.run_quiet(&["volume", "inspect", name]).await
    }

    async fn containers_using_volume(&self, name: &str) -> crate::Result<Vec<ContainerInfo>> {
        let filter = format!("volume={}", name);
        let stdout = self
            .run_captured(&[
                "ps",
                "-a",
                "--filter",
                &filter,
                "--format",
                "{{.ID}}\t{{.Names}}\t{{.State}}",
            ])
            .await?;

        let mut containers = Vec::new();
        for line in stdout.lines() {
            let mut fields = line.split('\t');
            let (Some(id), Some(name), Some(state)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            containers.push(ContainerInfo {
                id: id.to_string(),
                name: name.to_string(),
                running: state == "running",
            });
        }
        Ok(containers)
    }

    async fn stop_container(&self, id: &str, timeout_secs: u64) -> crate::Result<()> {
        let timeout = timeout_secs.to_string();
        let ok = self.run_quiet(&["stop", "-t", &timeout, id]).await?;
        if !ok {
            return Err(crate::Error::runtime(format!("failed to stop container {}", id)));
        }
        Ok(())
    }

    async fn start_container(&self, id: &str) -> crate::Result<()> {
        let ok = self.run_quiet(&["start", id]).await?;
        if !ok {
            return Err(crate::Error::runtime(format!("failed to start container {}", id)));
        }
        Ok(())
    }

    async fn restart_policy(&self, id: &str) -> crate::Result<RestartPolicy> {
        let stdout = self
            .run_captured(&[
                "inspect",
                "--format",
                "{{.HostConfig.RestartPolicy.Name}}",
                id,
            ])
            .await?;
        Ok(RestartPolicy::parse(stdout.trim()))
    }

    async fn run_disposable(
        &self,
        image: &str,
        volume: &str,
        staging: &Path,
        command: &[String],
    ) -> crate::Result<()> {
        let volume_mount = format!("{}:/volume:ro", volume);
        let staging_mount = format!("{}:/staging", staging.display());

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            volume_mount,
            "-v".to_string(),
            staging_mount,
            image.to_string(),
        ];
        args.extend(command.iter().cloned());

        let output = Command::new(&self.binary)
            .args(&args)
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| crate::Error::runtime(format!("failed to spawn {}: {}", self.binary, e)))?;
        if !output.status.success() {
            return Err(crate::Error::runtime(format!(
                "disposable container failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
