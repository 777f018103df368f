//! Retention candidate selection.

use chrono::{DateTime, Duration, Utc};

use bk_catalog::{ArtifactRecord, DeletionReason};
use bk_config::RetentionConfig;

/// One artifact selected for deletion, with the winning reason.
#[derive(Debug, Clone)]
pub struct RetentionCandidate {
    pub record: ArtifactRecord,
    pub reason: DeletionReason,
}

/// Select deletion candidates from one schedule's active artifact set.
///
/// `records` must be sorted by creation time descending, the order the
/// catalog lists in. An artifact at zero-based index `i` is a candidate
/// with reason `retention_count` when `i >= max_count`; otherwise it is a
/// candidate with reason `retention_days` when older than
/// `now - max_days`. Count wins ties.
pub fn select_candidates(
    records: &[ArtifactRecord],
    retention: &RetentionConfig,
    now: DateTime<Utc>,
) -> Vec<RetentionCandidate> {
    let age_cutoff = now - Duration::days(retention.max_days as i64);
    let mut candidates = Vec::new();

    for (index, record) in records.iter().enumerate() {
        if index >= retention.max_count as usize {
            candidates.push(RetentionCandidate {
                record: record.clone(),
                reason: DeletionReason::RetentionCount,
            });
            continue;
        }

        let created_at = match DateTime::parse_from_rfc3339(&record.created_at) {
            Ok(created_at) => created_at.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(
                    artifact_id = %record.artifact_id,
                    created_at = %record.created_at,
                    error = %e,
                    "unparseable creation timestamp, skipping retention check"
                );
                continue;
            }
        };
        if created_at < age_cutoff {
            candidates.push(RetentionCandidate {
                record: record.clone(),
                reason: DeletionReason::RetentionDays,
            });
        }
    }

    candidates
}
