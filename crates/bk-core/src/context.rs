//! The agent context: catalog handle, replicators, container runtime.
//!
//! One explicit value threaded through the orchestrators instead of
//! module-level store handles; the dispatcher owns it for its lifetime.

use std::sync::Arc;

use bk_catalog::{ArtifactKind, ArtifactRecord, ArtifactStore, Database};
use bk_config::Config;
use bk_storage::{
    LocalReplicator, RemoteReplicator, Replicator, ReplicatorKind, S3ObjectStore,
};
use bk_volumes::{ContainerRuntime, DockerCli};

/// Shared state for one agent process.
pub struct AgentContext {
    config: Config,
    catalog: Database,
    replicators: Vec<Arc<dyn Replicator>>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl AgentContext {
    /// Open the catalog and construct the enabled replicators from the
    /// configuration. Remote credentials are resolved here; missing
    /// credentials fail initialization.
    pub async fn initialize(config: Config) -> crate::Result<Self> {
        let catalog = Database::open(&config.database.path)?;

        let mut replicators: Vec<Arc<dyn Replicator>> = Vec::new();
        if config.local.enabled {
            replicators.push(Arc::new(LocalReplicator::new(&config.local.path)));
        }
        if config.remote.enabled {
            let client = Arc::new(S3ObjectStore::connect(&config.remote).await?);
            replicators.push(Arc::new(RemoteReplicator::new(
                &config.remote.bucket,
                config.remote.prefix.as_deref().unwrap_or(""),
                client,
            )));
        }

        Ok(Self {
            config,
            catalog,
            replicators,
            runtime: Arc::new(DockerCli::new()),
        })
    }

    /// Assemble a context from pre-built parts. Used by tests to swap in
    /// in-memory stores and fake runtimes.
    pub fn with_parts(
        config: Config,
        catalog: Database,
        replicators: Vec<Arc<dyn Replicator>>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            config,
            catalog,
            replicators,
            runtime,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Database {
        &self.catalog
    }

    pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
        self.runtime.clone()
    }

    pub fn replicators(&self) -> &[Arc<dyn Replicator>] {
        &self.replicators
    }

    /// The replicator of a given kind, when configured.
    pub fn replicator(&self, kind: ReplicatorKind) -> Option<Arc<dyn Replicator>> {
        self.replicators.iter().find(|r| r.kind() == kind).cloned()
    }

    /// Fetch one artifact record.
    pub fn get_artifact(&self, artifact_id: &str) -> crate::Result<Option<ArtifactRecord>> {
        Ok(self.catalog.with_conn(|conn| ArtifactStore::new(conn).get(artifact_id))?)
    }

    /// Active artifacts, optionally filtered by schedule and kind, newest
    /// first.
    pub fn list_artifacts(
        &self,
        schedule: Option<&str>,
        kind: Option<ArtifactKind>,
    ) -> crate::Result<Vec<ArtifactRecord>> {
        let records = self.catalog.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            match schedule {
                Some(schedule) => store.list_active_by_schedule(schedule),
                None => match kind {
                    Some(kind) => store.list_active_by_kind(kind),
                    None => store.list_all_active(),
                },
            }
        })?;
        Ok(match (schedule, kind) {
            (Some(_), Some(kind)) => {
                records.into_iter().filter(|r| r.kind() == kind).collect()
            }
            _ => records,
        })
    }
}
