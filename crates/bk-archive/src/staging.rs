//! Scoped temporary staging directories.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collect::CollectedFile;

/// Root under the system temp dir that all agent staging lives beneath.
pub fn staging_prefix() -> PathBuf {
    std::env::temp_dir().join("backitup")
}

fn unique_suffix() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}-{}-{}", std::process::id(), nanos, COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// A per-run staging directory, removed on drop.
///
/// Removal refuses to touch paths that do not live under the agent staging
/// prefix, so a corrupted path can never escalate into deleting arbitrary
/// trees.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a fresh staging directory with a unique suffix.
    pub fn create() -> crate::Result<Self> {
        let path = staging_prefix().join(format!("run-{}", unique_suffix()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Materialize collected files at their relative paths beneath a `stage`
    /// subdirectory, hard-linking where the filesystem allows and copying
    /// otherwise. Returns the staged tree root.
    pub fn materialize(&self, files: &[CollectedFile]) -> crate::Result<PathBuf> {
        let stage_root = self.path.join("stage");
        for file in files {
            let dest = stage_root.join(&file.relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if std::fs::hard_link(&file.absolute, &dest).is_err() {
                std::fs::copy(&file.absolute, &dest)?;
            }
        }
        Ok(stage_root)
    }

    /// Remove the directory now instead of waiting for drop.
    pub fn cleanup(self) -> crate::Result<()> {
        let result = remove_staged_path(&self.path);
        std::mem::forget(self);
        result
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = remove_staged_path(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staging directory");
        }
    }
}

/// Remove a staging path, refusing anything outside the agent prefix.
fn remove_staged_path(path: &Path) -> crate::Result<()> {
    if !path.starts_with(staging_prefix()) {
        return Err(crate::Error::StagingEscape {
            path: path.to_path_buf(),
        });
    }
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    Ok(())
}
