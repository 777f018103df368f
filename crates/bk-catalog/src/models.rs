//! Catalog record models and persistence operations.

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// At least one destination still holds the archive.
    Active,
    /// Every destination the artifact ever had has been stamped deleted.
    Deleted,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> crate::Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(crate::Error::invalid_value("status", other)),
        }
    }
}

/// Kind discriminator for an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Archive built from configured filesystem sources.
    Files,
    /// Archive captured from a named container volume.
    Volume,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Volume => "volume",
        }
    }

    pub fn parse(value: &str) -> crate::Result<Self> {
        match value {
            "files" => Ok(Self::Files),
            "volume" => Ok(Self::Volume),
            other => Err(crate::Error::invalid_value("kind", other)),
        }
    }
}

/// Destinations targeted by a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionTarget {
    Local,
    Remote,
    Both,
}

impl DeletionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Both => "both",
        }
    }

    pub fn parse(value: &str) -> crate::Result<Self> {
        match value {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "both" => Ok(Self::Both),
            other => Err(crate::Error::invalid_value("targets", other)),
        }
    }

    pub fn includes_local(&self) -> bool {
        matches!(self, Self::Local | Self::Both)
    }

    pub fn includes_remote(&self) -> bool {
        matches!(self, Self::Remote | Self::Both)
    }
}

/// Why an artifact was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    RetentionCount,
    RetentionDays,
    Manual,
}

impl DeletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetentionCount => "retention_count",
            Self::RetentionDays => "retention_days",
            Self::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> crate::Result<Self> {
        match value {
            "retention_count" => Ok(Self::RetentionCount),
            "retention_days" => Ok(Self::RetentionDays),
            "manual" => Ok(Self::Manual),
            other => Err(crate::Error::invalid_value("reason", other)),
        }
    }
}

/// State of the local destination for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDestination {
    /// Absolute path of the archive under the local root, if replicated.
    pub path: Option<String>,
    /// Deletion timestamp, once the local copy has been removed.
    pub deleted_at: Option<String>,
}

/// State of the remote object-store destination for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDestination {
    pub bucket: Option<String>,
    pub key: Option<String>,
    /// Deletion timestamp, once the remote object has been removed.
    pub deleted_at: Option<String>,
}

/// Kind-specific payload of an artifact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactDetail {
    Files {
        /// Contributing source paths, in configuration order.
        source_paths: Vec<String>,
        files_count: u32,
    },
    Volume {
        volume_name: String,
        /// Whether any running container mounted the volume at capture time.
        was_in_use: bool,
    },
}

impl ArtifactDetail {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Files { .. } => ArtifactKind::Files,
            Self::Volume { .. } => ArtifactKind::Volume,
        }
    }
}

/// One backup artifact and its deletion lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Catalog-assigned row id; 0 before insertion.
    pub id: i64,
    /// Globally unique opaque artifact id (stable external identifier).
    pub artifact_id: String,
    /// Owning schedule name.
    pub schedule: String,
    /// Archive filename.
    pub filename: String,
    /// Archive size in bytes.
    pub size_bytes: u64,
    /// SHA-256 of the archive, lowercase hex. Immutable after insertion.
    pub checksum: String,
    /// RFC 3339 creation timestamp in UTC.
    pub created_at: String,
    pub status: ArtifactStatus,
    pub detail: ArtifactDetail,
    pub local: LocalDestination,
    pub remote: RemoteDestination,
}

impl ArtifactRecord {
    /// Create an uninserted files-kind record with a fresh artifact id and
    /// both destinations empty.
    pub fn new_files(
        schedule: &str,
        filename: &str,
        size_bytes: u64,
        checksum: &str,
        source_paths: Vec<String>,
        files_count: u32,
    ) -> Self {
        Self {
            id: 0,
            artifact_id: uuid::Uuid::new_v4().to_string(),
            schedule: schedule.to_string(),
            filename: filename.to_string(),
            size_bytes,
            checksum: checksum.to_string(),
            created_at: Utc::now().to_rfc3339(),
            status: ArtifactStatus::Active,
            detail: ArtifactDetail::Files {
                source_paths,
                files_count,
            },
            local: LocalDestination::default(),
            remote: RemoteDestination::default(),
        }
    }

    /// Create an uninserted volume-kind record.
    pub fn new_volume(
        schedule: &str,
        filename: &str,
        size_bytes: u64,
        checksum: &str,
        volume_name: &str,
        was_in_use: bool,
    ) -> Self {
        Self {
            id: 0,
            artifact_id: uuid::Uuid::new_v4().to_string(),
            schedule: schedule.to_string(),
            filename: filename.to_string(),
            size_bytes,
            checksum: checksum.to_string(),
            created_at: Utc::now().to_rfc3339(),
            status: ArtifactStatus::Active,
            detail: ArtifactDetail::Volume {
                volume_name: volume_name.to_string(),
                was_in_use,
            },
            local: LocalDestination::default(),
            remote: RemoteDestination::default(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.detail.kind()
    }

    /// Whether the record ever had a local copy.
    pub fn has_local(&self) -> bool {
        self.local.path.is_some()
    }

    /// Whether the record ever had a remote object.
    pub fn has_remote(&self) -> bool {
        self.remote.key.is_some()
    }

    /// True when every destination the record ever had carries a deletion
    /// stamp. Records with no destination at all do not qualify.
    pub fn all_destinations_stamped(&self) -> bool {
        if !self.has_local() && !self.has_remote() {
            return false;
        }
        let local_done = !self.has_local() || self.local.deleted_at.is_some();
        let remote_done = !self.has_remote() || self.remote.deleted_at.is_some();
        local_done && remote_done
    }
}

/// Append-only audit record of one deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionLogEntry {
    /// Catalog-assigned row id; 0 before insertion.
    pub id: i64,
    pub artifact_id: String,
    pub targets: DeletionTarget,
    /// Recorded local path at the time of the attempt.
    pub local_path: Option<String>,
    /// Recorded remote key at the time of the attempt.
    pub remote_key: Option<String>,
    pub reason: DeletionReason,
    pub deleted_at: String,
    pub success: bool,
    pub error: Option<String>,
}

impl DeletionLogEntry {
    /// Create an uninserted entry stamped with the current time.
    pub fn new(
        artifact_id: &str,
        targets: DeletionTarget,
        local_path: Option<String>,
        remote_key: Option<String>,
        reason: DeletionReason,
        success: bool,
        error: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            artifact_id: artifact_id.to_string(),
            targets,
            local_path,
            remote_key,
            reason,
            deleted_at: Utc::now().to_rfc3339(),
            success,
            error,
        }
    }
}

const ARTIFACT_COLUMNS: &str = "id, artifact_id, schedule, filename, size_bytes, checksum, \
     files_count, source_paths, created_at, status, kind, volume_name, volume_in_use, \
     local_path, local_deleted_at, remote_bucket, remote_key, remote_deleted_at";

/// Database operations for artifact records.
pub struct ArtifactStore<'a> {
    conn: &'a Connection,
}

impl<'a> ArtifactStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawArtifactRow> {
        Ok(RawArtifactRow {
            id: row.get(0)?,
            artifact_id: row.get(1)?,
            schedule: row.get(2)?,
            filename: row.get(3)?,
            size_bytes: row.get(4)?,
            checksum: row.get(5)?,
            files_count: row.get(6)?,
            source_paths: row.get(7)?,
            created_at: row.get(8)?,
            status: row.get(9)?,
            kind: row.get(10)?,
            volume_name: row.get(11)?,
            volume_in_use: row.get(12)?,
            local_path: row.get(13)?,
            local_deleted_at: row.get(14)?,
            remote_bucket: row.get(15)?,
            remote_key: row.get(16)?,
            remote_deleted_at: row.get(17)?,
        })
    }

    /// Insert a record. Idempotent on artifact id: a second insert with the
    /// same id leaves the stored row untouched. Returns the stored record.
    pub fn insert(&self, record: &ArtifactRecord) -> crate::Result<ArtifactRecord> {
        let (files_count, source_paths, volume_name, volume_in_use) = match &record.detail {
            ArtifactDetail::Files {
                source_paths,
                files_count,
            } => (
                Some(*files_count as i64),
                Some(serde_json::to_string(source_paths)?),
                None,
                false,
            ),
            ArtifactDetail::Volume {
                volume_name,
                was_in_use,
            } => (None, None, Some(volume_name.clone()), *was_in_use),
        };

        self.conn.execute(
            r#"
            INSERT INTO backups (
                artifact_id, schedule, filename, size_bytes, checksum,
                files_count, source_paths, created_at, status, kind,
                volume_name, volume_in_use,
                local_path, local_deleted_at, remote_bucket, remote_key, remote_deleted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(artifact_id) DO NOTHING
            "#,
            params![
                record.artifact_id,
                record.schedule,
                record.filename,
                record.size_bytes as i64,
                record.checksum,
                files_count,
                source_paths,
                record.created_at,
                record.status.as_str(),
                record.kind().as_str(),
                volume_name,
                volume_in_use as i64,
                record.local.path,
                record.local.deleted_at,
                record.remote.bucket,
                record.remote.key,
                record.remote.deleted_at,
            ],
        )?;

        self.get(&record.artifact_id)?
            .ok_or_else(|| crate::Error::not_found(&record.artifact_id))
    }

    /// Fetch a record by artifact id.
    pub fn get(&self, artifact_id: &str) -> crate::Result<Option<ArtifactRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM backups WHERE artifact_id = ?",
            ARTIFACT_COLUMNS
        ))?;

        let mut rows = stmt.query_map(params![artifact_id], Self::map_row)?;
        match rows.next() {
            Some(Ok(raw)) => Ok(Some(raw.into_record()?)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Active records for one schedule, newest first.
    pub fn list_active_by_schedule(&self, schedule: &str) -> crate::Result<Vec<ArtifactRecord>> {
        self.list_where("schedule = ?", params![schedule])
    }

    /// Active records of one kind, newest first.
    pub fn list_active_by_kind(&self, kind: ArtifactKind) -> crate::Result<Vec<ArtifactRecord>> {
        self.list_where("kind = ?", params![kind.as_str()])
    }

    /// All active records, newest first.
    pub fn list_all_active(&self) -> crate::Result<Vec<ArtifactRecord>> {
        self.list_where("1 = 1", params![])
    }

    fn list_where(
        &self,
        predicate: &str,
        params: impl rusqlite::Params,
    ) -> crate::Result<Vec<ArtifactRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM backups WHERE status = 'active' AND {} ORDER BY created_at DESC",
            ARTIFACT_COLUMNS, predicate
        ))?;

        let rows = stmt.query_map(params, Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Number of active records for one schedule.
    pub fn count_active(&self, schedule: &str) -> crate::Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM backups WHERE status = 'active' AND schedule = ?",
            params![schedule],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Record the local destination path after a successful save.
    pub fn update_local(&self, artifact_id: &str, path: &str) -> crate::Result<()> {
        let changed = self.conn.execute(
            "UPDATE backups SET local_path = ? WHERE artifact_id = ?",
            params![path, artifact_id],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found(artifact_id));
        }
        Ok(())
    }

    /// Record the remote destination after a successful upload.
    pub fn update_remote(&self, artifact_id: &str, bucket: &str, key: &str) -> crate::Result<()> {
        let changed = self.conn.execute(
            "UPDATE backups SET remote_bucket = ?, remote_key = ? WHERE artifact_id = ?",
            params![bucket, key, artifact_id],
        )?;
        if changed == 0 {
            return Err(crate::Error::not_found(artifact_id));
        }
        Ok(())
    }

    /// Stamp `deleted_at` for the targeted destinations the record actually
    /// has, then transition status to `deleted` once every destination the
    /// record ever had is stamped. Returns the updated record.
    pub fn mark_deleted(
        &self,
        artifact_id: &str,
        which: DeletionTarget,
    ) -> crate::Result<ArtifactRecord> {
        let now = Utc::now().to_rfc3339();

        if which.includes_local() {
            self.conn.execute(
                "UPDATE backups SET local_deleted_at = COALESCE(local_deleted_at, ?) \
                 WHERE artifact_id = ? AND local_path IS NOT NULL",
                params![now, artifact_id],
            )?;
        }
        if which.includes_remote() {
            self.conn.execute(
                "UPDATE backups SET remote_deleted_at = COALESCE(remote_deleted_at, ?) \
                 WHERE artifact_id = ? AND remote_key IS NOT NULL",
                params![now, artifact_id],
            )?;
        }

        let record =
            self.get(artifact_id)?.ok_or_else(|| crate::Error::not_found(artifact_id))?;
        if record.status == ArtifactStatus::Active && record.all_destinations_stamped() {
            self.conn.execute(
                "UPDATE backups SET status = 'deleted' WHERE artifact_id = ?",
                params![artifact_id],
            )?;
            return self.get(artifact_id)?.ok_or_else(|| crate::Error::not_found(artifact_id));
        }
        Ok(record)
    }

    /// Hard-delete a record that never reached a destination. Used by the
    /// backup orchestrator to undo an insert whose replication failed
    /// entirely, keeping the per-artifact transactional guarantee.
    pub fn remove(&self, artifact_id: &str) -> crate::Result<()> {
        self.conn.execute("DELETE FROM backups WHERE artifact_id = ?", params![artifact_id])?;
        Ok(())
    }
}

/// Raw row shape before JSON decoding of the source path list.
struct RawArtifactRow {
    id: i64,
    artifact_id: String,
    schedule: String,
    filename: String,
    size_bytes: i64,
    checksum: String,
    files_count: Option<i64>,
    source_paths: Option<String>,
    created_at: String,
    status: String,
    kind: String,
    volume_name: Option<String>,
    volume_in_use: i64,
    local_path: Option<String>,
    local_deleted_at: Option<String>,
    remote_bucket: Option<String>,
    remote_key: Option<String>,
    remote_deleted_at: Option<String>,
}

impl RawArtifactRow {
    fn into_record(self) -> crate::Result<ArtifactRecord> {
        let kind = ArtifactKind::parse(&self.kind)?;
        let detail = match kind {
            ArtifactKind::Files => ArtifactDetail::Files {
                source_paths: match self.source_paths {
                    Some(json) => serde_json::from_str(&json)?,
                    None => Vec::new(),
                },
                files_count: self.files_count.unwrap_or(0) as u32,
            },
            ArtifactKind::Volume => ArtifactDetail::Volume {
                volume_name: self
                    .volume_name
                    .ok_or_else(|| crate::Error::invalid_value("volume_name", "NULL"))?,
                was_in_use: self.volume_in_use != 0,
            },
        };

        Ok(ArtifactRecord {
            id: self.id,
            artifact_id: self.artifact_id,
            schedule: self.schedule,
            filename: self.filename,
            size_bytes: self.size_bytes as u64,
            checksum: self.checksum,
            created_at: self.created_at,
            status: ArtifactStatus::parse(&self.status)?,
            detail,
            local: LocalDestination {
                path: self.local_path,
                deleted_at: self.local_deleted_at,
            },
            remote: RemoteDestination {
                bucket: self.remote_bucket,
                key: self.remote_key,
                deleted_at: self.remote_deleted_at,
            },
        })
    }
}

/// Database operations for the deletion log.
pub struct DeletionLogStore<'a> {
    conn: &'a Connection,
}

impl<'a> DeletionLogStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append an entry. The log is append-only; entries are never updated.
    pub fn append(&self, entry: &DeletionLogEntry) -> crate::Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO deletion_log (
                artifact_id, targets, local_path, remote_key,
                reason, deleted_at, success, error
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.artifact_id,
                entry.targets.as_str(),
                entry.local_path,
                entry.remote_key,
                entry.reason.as_str(),
                entry.deleted_at,
                entry.success as i64,
                entry.error,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Entries for one artifact, oldest first.
    pub fn list_for_artifact(&self, artifact_id: &str) -> crate::Result<Vec<DeletionLogEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, artifact_id, targets, local_path, remote_key,
                   reason, deleted_at, success, error
            FROM deletion_log
            WHERE artifact_id = ?
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![artifact_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, artifact_id, targets, local_path, remote_key, reason, deleted_at, success, error) =
                row?;
            entries.push(DeletionLogEntry {
                id,
                artifact_id,
                targets: DeletionTarget::parse(&targets)?,
                local_path,
                remote_key,
                reason: DeletionReason::parse(&reason)?,
                deleted_at,
                success: success != 0,
                error,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn files_record(schedule: &str) -> ArtifactRecord {
        ArtifactRecord::new_files(
            schedule,
            "backitup_app_daily_2024-06-04_090000_a1b2c3.tar.gz",
            1024,
            "deadbeef",
            vec!["/srv/app".to_string()],
            2,
        )
    }

    #[test]
    fn insert_then_get_round_trips() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let record = files_record("daily");
            let stored = store.insert(&record).unwrap();
            assert!(stored.id > 0);

            let fetched = store.get(&record.artifact_id).unwrap().unwrap();
            assert_eq!(fetched, stored);
            assert_eq!(fetched.schedule, "daily");
            assert_eq!(fetched.kind(), ArtifactKind::Files);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn insert_is_idempotent_on_artifact_id() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let record = files_record("daily");
            let first = store.insert(&record).unwrap();

            let mut dup = record.clone();
            dup.filename = "something-else.tar.gz".to_string();
            let second = store.insert(&dup).unwrap();

            assert_eq!(first, second);
            assert_eq!(store.list_all_active().unwrap().len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn listing_orders_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let mut older = files_record("daily");
            older.created_at = "2024-06-01T00:00:00+00:00".to_string();
            let mut newer = files_record("daily");
            newer.created_at = "2024-06-02T00:00:00+00:00".to_string();
            store.insert(&older).unwrap();
            store.insert(&newer).unwrap();

            let listed = store.list_active_by_schedule("daily").unwrap();
            assert_eq!(listed.len(), 2);
            assert_eq!(listed[0].artifact_id, newer.artifact_id);
            assert_eq!(listed[1].artifact_id, older.artifact_id);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn mark_deleted_on_both_transitions_status() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let record = store.insert(&files_record("daily")).unwrap();
            store.update_local(&record.artifact_id, "/tmp/bk/a.tar.gz").unwrap();
            store.update_remote(&record.artifact_id, "bucket", "backups/a.tar.gz").unwrap();

            let after_local = store.mark_deleted(&record.artifact_id, DeletionTarget::Local).unwrap();
            assert_eq!(after_local.status, ArtifactStatus::Active);
            assert!(after_local.local.deleted_at.is_some());
            assert!(after_local.remote.deleted_at.is_none());

            let after_both = store.mark_deleted(&record.artifact_id, DeletionTarget::Remote).unwrap();
            assert_eq!(after_both.status, ArtifactStatus::Deleted);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn mark_deleted_ignores_destinations_never_present() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let record = store.insert(&files_record("daily")).unwrap();
            store.update_local(&record.artifact_id, "/tmp/bk/a.tar.gz").unwrap();

            // Local-only record: stamping local alone completes the lifecycle.
            let updated = store.mark_deleted(&record.artifact_id, DeletionTarget::Both).unwrap();
            assert_eq!(updated.status, ArtifactStatus::Deleted);
            assert!(updated.remote.deleted_at.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn deleted_records_leave_active_listings() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let record = store.insert(&files_record("daily")).unwrap();
            store.update_local(&record.artifact_id, "/tmp/bk/a.tar.gz").unwrap();
            store.mark_deleted(&record.artifact_id, DeletionTarget::Local).unwrap();

            assert!(store.list_active_by_schedule("daily").unwrap().is_empty());
            assert_eq!(store.count_active("daily").unwrap(), 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn volume_records_round_trip_detail_fields() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = ArtifactStore::new(conn);
            let record = ArtifactRecord::new_volume(
                "nightly",
                "backitup-volume-pgdata-nightly-2024-06-04T09-00-00-000Z.tar.gz",
                2048,
                "cafebabe",
                "pgdata",
                true,
            );
            let stored = store.insert(&record).unwrap();
            match stored.detail {
                ArtifactDetail::Volume {
                    ref volume_name,
                    was_in_use,
                } => {
                    assert_eq!(volume_name, "pgdata");
                    assert!(was_in_use);
                }
                _ => panic!("expected volume detail"),
            }

            let by_kind = store.list_active_by_kind(ArtifactKind::Volume).unwrap();
            assert_eq!(by_kind.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn deletion_log_appends_and_lists() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let log = DeletionLogStore::new(conn);
            let entry = DeletionLogEntry::new(
                "abc",
                DeletionTarget::Both,
                Some("/tmp/bk/a.tar.gz".to_string()),
                Some("backups/a.tar.gz".to_string()),
                DeletionReason::RetentionCount,
                true,
                None,
            );
            let id = log.append(&entry).unwrap();
            assert!(id > 0);

            let failure = DeletionLogEntry::new(
                "abc",
                DeletionTarget::Local,
                Some("/tmp/bk/a.tar.gz".to_string()),
                None,
                DeletionReason::RetentionDays,
                false,
                Some("checksum mismatch".to_string()),
            );
            log.append(&failure).unwrap();

            let entries = log.list_for_artifact("abc").unwrap();
            assert_eq!(entries.len(), 2);
            assert!(entries[0].success);
            assert!(!entries[1].success);
            assert_eq!(entries[1].reason, DeletionReason::RetentionDays);
            Ok(())
        })
        .unwrap();
    }
}
