//! Remote object-store replicator.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::keys::build_remote_key;
use crate::object_store::ObjectStoreClient;
use crate::{DeleteOutcome, Replicator, ReplicatorKind, SavedLocation};

/// Replicator uploading archives to a bucket under a global prefix.
pub struct RemoteReplicator {
    bucket: String,
    prefix: String,
    client: Arc<dyn ObjectStoreClient>,
}

impl RemoteReplicator {
    pub fn new(bucket: &str, prefix: &str, client: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            client,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key a given archive name and grouping would upload to.
    pub fn key_for(&self, archive_name: &str, grouping: &str) -> String {
        build_remote_key(&self.prefix, grouping, archive_name)
    }
}

#[async_trait]
impl Replicator for RemoteReplicator {
    fn kind(&self) -> ReplicatorKind {
        ReplicatorKind::Remote
    }

    async fn save(
        &self,
        source_path: &Path,
        archive_name: &str,
        grouping: &str,
    ) -> crate::Result<SavedLocation> {
        let key = self.key_for(archive_name, grouping);
        self.client.put_object(&self.bucket, &key, source_path).await?;

        // Uploads are verified by existence; the backend does not expose
        // content checksums.
        if !self.client.object_exists(&self.bucket, &key).await? {
            return Err(crate::Error::VerificationFailed {
                location: format!("{}/{}", self.bucket, key),
            });
        }

        tracing::debug!(bucket = %self.bucket, %key, "archive uploaded");
        Ok(SavedLocation {
            kind: ReplicatorKind::Remote,
            location: key,
            bucket: Some(self.bucket.clone()),
            checksum: None,
        })
    }

    async fn delete(&self, location: &str) -> crate::Result<DeleteOutcome> {
        if !self.client.object_exists(&self.bucket, location).await? {
            tracing::warn!(bucket = %self.bucket, key = location, "remote object already missing");
            return Ok(DeleteOutcome::AlreadyMissing);
        }
        self.client.delete_object(&self.bucket, location).await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn exists(&self, location: &str) -> crate::Result<bool> {
        self.client.object_exists(&self.bucket, location).await
    }

    async fn checksum(&self, _location: &str) -> crate::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObjectStore;

    fn archive(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("a.tar.gz");
        std::fs::write(&path, b"archive-bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn save_uploads_under_prefixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let source = archive(dir.path());
        let store = Arc::new(InMemoryObjectStore::new());
        let replicator = RemoteReplicator::new("bucket", "backups/", store.clone());

        let saved = replicator.save(&source, "a.tar.gz", "app").await.unwrap();
        assert_eq!(saved.location, "backups/app/a.tar.gz");
        assert_eq!(saved.bucket.as_deref(), Some("bucket"));
        assert_eq!(saved.checksum, None);
        assert_eq!(store.get("bucket", "backups/app/a.tar.gz").unwrap(), b"archive-bytes");
    }

    #[tokio::test]
    async fn delete_treats_missing_as_warning() {
        let store = Arc::new(InMemoryObjectStore::new());
        let replicator = RemoteReplicator::new("bucket", "backups", store);
        assert_eq!(
            replicator.delete("backups/app/gone.tar.gz").await.unwrap(),
            DeleteOutcome::AlreadyMissing
        );
    }

    #[tokio::test]
    async fn exists_probes_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let source = archive(dir.path());
        let store = Arc::new(InMemoryObjectStore::new());
        let replicator = RemoteReplicator::new("bucket", "backups", store.clone());

        let saved = replicator.save(&source, "a.tar.gz", "").await.unwrap();
        assert!(replicator.exists(&saved.location).await.unwrap());

        store.evict("bucket", &saved.location);
        assert!(!replicator.exists(&saved.location).await.unwrap());
    }

    #[tokio::test]
    async fn remote_checksum_is_unavailable() {
        let store = Arc::new(InMemoryObjectStore::new());
        let replicator = RemoteReplicator::new("bucket", "backups", store);
        assert_eq!(replicator.checksum("any").await.unwrap(), None);
    }
}
