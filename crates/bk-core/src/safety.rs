//! The seven-gate deletion safety validator.
//!
//! Cleanup is the most dangerous operation in the agent; each gate closes a
//! distinct failure mode: missing record, pattern mismatch, path traversal,
//! tamper, misrouted destination. Gates run in order and the first failure
//! rejects the candidate; warnings accumulate on a valid verdict.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bk_archive::{parse_archive_name, sha256_file};
use bk_catalog::{ArtifactStore, Database};
use bk_config::Config;
use bk_storage::Replicator;

/// Validation outcome for one deletion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid { warnings: Vec<String> },
    Rejected { gate: &'static str, reason: String },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    fn rejected<S: Into<String>>(gate: &'static str, reason: S) -> Self {
        Self::Rejected {
            gate,
            reason: reason.into(),
        }
    }
}

/// True when `path` equals `dir` or is a descendant of it, compared
/// component-wise so that `/data/backups-old` never counts as inside
/// `/data/backups`.
pub fn is_path_within_dir(path: &Path, dir: &Path) -> bool {
    let path: Vec<Component<'_>> = path.components().collect();
    let dir: Vec<Component<'_>> = dir.components().collect();
    if dir.len() > path.len() {
        return false;
    }
    dir.iter().zip(path.iter()).all(|(a, b)| a == b)
}

/// Canonicalize where possible, falling back to a lexical normalization of
/// `.` and `..` components for paths that no longer exist.
fn canonical_or_lexical(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Validates deletion candidates against the catalog, the configured
/// destinations, and the bytes on disk.
pub struct SafetyValidator {
    catalog: Database,
    archive_prefix: String,
    local_root: Option<PathBuf>,
    remote_bucket: Option<String>,
    remote_prefix: String,
    verify_checksum: bool,
    remote: Option<Arc<dyn Replicator>>,
}

impl SafetyValidator {
    pub fn new(
        config: &Config,
        catalog: Database,
        remote: Option<Arc<dyn Replicator>>,
    ) -> Self {
        Self {
            catalog,
            archive_prefix: config.archive.prefix.clone(),
            local_root: config.local.enabled.then(|| config.local.path.clone()),
            remote_bucket: config.remote.enabled.then(|| config.remote.bucket.clone()),
            remote_prefix: config
                .remote
                .prefix
                .as_deref()
                .unwrap_or("")
                .trim_end_matches('/')
                .to_string(),
            verify_checksum: config.safety.verify_checksum_before_delete,
            remote,
        }
    }

    /// Run the gates for one candidate, identified by artifact id.
    pub async fn validate(&self, artifact_id: &str) -> crate::Result<Verdict> {
        let mut warnings = Vec::new();

        // Gate 1: the record must still exist, read fresh.
        let record = self
            .catalog
            .with_conn(|conn| ArtifactStore::new(conn).get(artifact_id))?;
        let Some(record) = record else {
            return Ok(Verdict::rejected("catalog", "artifact not in catalog"));
        };

        // Gate 2: the filename must match a backup naming convention and
        // carry the configured prefix.
        let Some(parsed) = parse_archive_name(&record.filename) else {
            return Ok(Verdict::rejected(
                "name",
                format!("filename does not match backup naming convention: {}", record.filename),
            ));
        };
        if parsed.prefix != self.archive_prefix {
            return Ok(Verdict::rejected(
                "name",
                format!(
                    "archive prefix '{}' does not match configured prefix '{}'",
                    parsed.prefix, self.archive_prefix
                ),
            ));
        }

        let live_local = record
            .local
            .deleted_at
            .is_none()
            .then_some(record.local.path.as_deref())
            .flatten();
        if let Some(local_path) = live_local {
            let local_path = Path::new(local_path);

            // Gate 3: the local path must stay inside the configured root.
            let Some(root) = &self.local_root else {
                return Ok(Verdict::rejected(
                    "local-containment",
                    "record has a local location but no local root is configured",
                ));
            };
            let canonical_file = canonical_or_lexical(local_path);
            let canonical_root = canonical_or_lexical(root);
            if !is_path_within_dir(&canonical_file, &canonical_root) {
                return Ok(Verdict::rejected(
                    "local-containment",
                    format!(
                        "local path {} escapes configured root {}",
                        canonical_file.display(),
                        canonical_root.display()
                    ),
                ));
            }

            // Gate 4: already-gone local files are a warning, not a failure.
            if !local_path.is_file() {
                warnings.push(format!("local archive already missing: {}", local_path.display()));
            } else if self.verify_checksum {
                // Gate 5: the bytes on disk must still be the bytes recorded.
                let actual = sha256_file(local_path)?;
                if actual != record.checksum {
                    return Ok(Verdict::rejected(
                        "checksum",
                        format!(
                            "checksum mismatch for {}: tampered or corrupted",
                            local_path.display()
                        ),
                    ));
                }
            }
        }

        let live_remote = record
            .remote
            .deleted_at
            .is_none()
            .then_some(record.remote.key.as_deref())
            .flatten();
        if let Some(remote_key) = live_remote {
            // Gate 6: the key must sit under the configured prefix in the
            // configured bucket.
            if !self.remote_prefix.is_empty()
                && !remote_key.starts_with(&format!("{}/", self.remote_prefix))
            {
                return Ok(Verdict::rejected(
                    "remote-containment",
                    format!(
                        "remote key '{}' is outside configured prefix '{}'",
                        remote_key, self.remote_prefix
                    ),
                ));
            }
            match (&record.remote.bucket, &self.remote_bucket) {
                (Some(recorded), Some(configured)) if recorded != configured => {
                    return Ok(Verdict::rejected(
                        "remote-containment",
                        format!(
                            "remote bucket '{}' does not match configured bucket '{}'",
                            recorded, configured
                        ),
                    ));
                }
                _ => {}
            }

            // Gate 7: already-gone remote objects are a warning.
            if let Some(remote) = &self.remote {
                if !remote.exists(remote_key).await? {
                    warnings.push(format!("remote object already missing: {}", remote_key));
                }
            }
        }

        Ok(Verdict::Valid { warnings })
    }
}
