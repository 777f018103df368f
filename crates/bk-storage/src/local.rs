//! Local directory replicator.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use bk_archive::sha256_file;

use crate::{DeleteOutcome, Replicator, ReplicatorKind, SavedLocation};

/// Replicator writing archives into a local destination root.
pub struct LocalReplicator {
    root: PathBuf,
}

impl LocalReplicator {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path a given archive name would land at.
    pub fn destination(&self, archive_name: &str) -> PathBuf {
        self.root.join(archive_name)
    }
}

#[async_trait]
impl Replicator for LocalReplicator {
    fn kind(&self) -> ReplicatorKind {
        ReplicatorKind::Local
    }

    async fn save(
        &self,
        source_path: &Path,
        archive_name: &str,
        _grouping: &str,
    ) -> crate::Result<SavedLocation> {
        std::fs::create_dir_all(&self.root)?;
        let dest = self.destination(archive_name);

        let expected = sha256_file(source_path)?;
        std::fs::copy(source_path, &dest)?;
        let actual = sha256_file(&dest)?;
        if actual != expected {
            std::fs::remove_file(&dest).ok();
            return Err(crate::Error::ChecksumMismatch {
                path: dest,
                expected,
                actual,
            });
        }

        tracing::debug!(dest = %dest.display(), "archive copied to local root");
        Ok(SavedLocation {
            kind: ReplicatorKind::Local,
            location: dest.to_string_lossy().into_owned(),
            bucket: None,
            checksum: Some(actual),
        })
    }

    async fn delete(&self, location: &str) -> crate::Result<DeleteOutcome> {
        match std::fs::remove_file(location) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(location, "local archive already missing");
                Ok(DeleteOutcome::AlreadyMissing)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &str) -> crate::Result<bool> {
        Ok(Path::new(location).is_file())
    }

    async fn checksum(&self, location: &str) -> crate::Result<Option<String>> {
        Ok(Some(sha256_file(location)?))
    }
}
