//! Read-only verification of local artifacts against the catalog.

use serde::Serialize;
use std::path::Path;

use bk_archive::sha256_file;

use crate::context::AgentContext;

/// Result of re-checksumming local artifacts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    /// Artifacts with a live local copy that were checked.
    pub checked: usize,
    pub ok: usize,
    /// Artifact ids whose local bytes no longer match the recorded checksum.
    pub mismatched: Vec<String>,
    /// Artifact ids whose local file is gone.
    pub missing: Vec<String>,
}

/// Re-checksum every active artifact's local copy, optionally restricted
/// to one schedule. Mutates nothing.
pub async fn verify_local(
    ctx: &AgentContext,
    schedule: Option<&str>,
) -> crate::Result<VerifyReport> {
    let records = ctx.list_artifacts(schedule, None)?;
    let mut report = VerifyReport::default();

    for record in records {
        let Some(path) = &record.local.path else {
            continue;
        };
        if record.local.deleted_at.is_some() {
            continue;
        }
        report.checked += 1;

        if !Path::new(path).is_file() {
            tracing::warn!(artifact_id = %record.artifact_id, %path, "local archive missing");
            report.missing.push(record.artifact_id.clone());
            continue;
        }

        let actual = sha256_file(path)?;
        if actual == record.checksum {
            report.ok += 1;
        } else {
            tracing::error!(
                artifact_id = %record.artifact_id,
                %path,
                expected = %record.checksum,
                %actual,
                "local archive checksum mismatch"
            );
            report.mismatched.push(record.artifact_id.clone());
        }
    }

    Ok(report)
}
