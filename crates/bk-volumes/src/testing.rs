//! In-memory container runtime for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::runtime::{ContainerInfo, ContainerRuntime, RestartPolicy};

struct FakeContainer {
    name: String,
    volume: String,
    running: bool,
    policy: RestartPolicy,
    start_attempts: u32,
    fail_starts_remaining: u32,
}

#[derive(Default)]
struct FakeState {
    volumes: Vec<String>,
    containers: HashMap<String, FakeContainer>,
    stop_log: Vec<String>,
    fail_pack: bool,
}

/// Container runtime keeping all state in memory.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_volume(&self, name: &str) {
        self.state.lock().unwrap().volumes.push(name.to_string());
    }

    pub fn add_container(
        &self,
        id: &str,
        name: &str,
        volume: &str,
        running: bool,
        policy: RestartPolicy,
    ) {
        self.state.lock().unwrap().containers.insert(
            id.to_string(),
            FakeContainer {
                name: name.to_string(),
                volume: volume.to_string(),
                running,
                policy,
                start_attempts: 0,
                fail_starts_remaining: 0,
            },
        );
    }

    /// Make the next `times` start attempts for a container fail.
    pub fn fail_start_times(&self, id: &str, times: u32) {
        if let Some(c) = self.state.lock().unwrap().containers.get_mut(id) {
            c.fail_starts_remaining = times;
        }
    }

    /// Make every disposable-container run fail.
    pub fn fail_pack(&self) {
        self.state.lock().unwrap().fail_pack = true;
    }

    /// Ids of containers that received a stop call, in order.
    pub fn stopped_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().stop_log.clone()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.state.lock().unwrap().containers.get(id).map(|c| c.running).unwrap_or(false)
    }

    pub fn start_attempts(&self, id: &str) -> u32 {
        self.state.lock().unwrap().containers.get(id).map(|c| c.start_attempts).unwrap_or(0)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn volume_exists(&self, name: &str) -> crate::Result<bool> {
        Ok(self.state.lock().unwrap().volumes.iter().any(|v| v == name))
    }

    async fn containers_using_volume(&self, name: &str) -> crate::Result<Vec<ContainerInfo>> {
        let state = self.state.lock().unwrap();
        let mut containers: Vec<ContainerInfo> = state
            .containers
            .iter()
            .filter(|(_, c)| c.volume == name)
            .map(|(id, c)| ContainerInfo {
                id: id.clone(),
                name: c.name.clone(),
                running: c.running,
            })
            .collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(containers)
    }

    async fn stop_container(&self, id: &str, _timeout_secs: u64) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stop_log.push(id.to_string());
        match state.containers.get_mut(id) {
            Some(c) => {
                c.running = false;
                Ok(())
            }
            None => Err(crate::Error::runtime(format!("no such container: {}", id))),
        }
    }

    async fn start_container(&self, id: &str) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(id) {
            Some(c) => {
                c.start_attempts += 1;
                if c.fail_starts_remaining > 0 {
                    c.fail_starts_remaining -= 1;
                    return Err(crate::Error::runtime(format!("start failed for {}", id)));
                }
                c.running = true;
                Ok(())
            }
            None => Err(crate::Error::runtime(format!("no such container: {}", id))),
        }
    }

    async fn restart_policy(&self, id: &str) -> crate::Result<RestartPolicy> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(id)
            .map(|c| c.policy)
            .ok_or_else(|| crate::Error::runtime(format!("no such container: {}", id)))
    }

    async fn run_disposable(
        &self,
        _image: &str,
        volume: &str,
        staging: &Path,
        command: &[String],
    ) -> crate::Result<()> {
        if self.state.lock().unwrap().fail_pack {
            return Err(crate::Error::runtime("disposable container exited non-zero"));
        }

        // The pipeline always packs with `tar czf /staging/<name> -C /volume .`;
        // recover the archive name from the command and write a placeholder.
        let dest = command
            .iter()
            .find_map(|arg| arg.strip_prefix("/staging/"))
            .ok_or_else(|| crate::Error::runtime("unexpected pack command"))?;
        std::fs::write(staging.join(dest), format!("fake-volume-tar:{}", volume))?;
        Ok(())
    }
}
