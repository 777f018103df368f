//! Forward migration of an existing version-1 store.

use bk_catalog::{ArtifactRecord, ArtifactStore, Database, MigrationManager};
use rusqlite::Connection;

/// Recreate the version-1 schema by hand, the way a store written by an
/// older agent would look on disk.
fn write_v1_store(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        CREATE TABLE backups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artifact_id TEXT NOT NULL UNIQUE,
            schedule TEXT NOT NULL,
            filename TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            checksum TEXT NOT NULL,
            files_count INTEGER,
            source_paths TEXT,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            local_path TEXT,
            local_deleted_at TEXT,
            remote_bucket TEXT,
            remote_key TEXT,
            remote_deleted_at TEXT
        );
        CREATE TABLE deletion_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artifact_id TEXT NOT NULL,
            targets TEXT NOT NULL,
            local_path TEXT,
            remote_key TEXT,
            reason TEXT NOT NULL,
            deleted_at TEXT NOT NULL,
            success INTEGER NOT NULL,
            error TEXT
        );
        INSERT INTO schema_version (version, applied_at)
            VALUES (1, '2024-01-01T00:00:00+00:00');
        INSERT INTO backups (
            artifact_id, schedule, filename, size_bytes, checksum,
            files_count, source_paths, created_at, local_path
        ) VALUES (
            'legacy-artifact', 'daily',
            'backitup_app_daily_2024-01-01_030000_abc123.tar.gz',
            100, 'deadbeef', 2, '["/srv/app"]',
            '2024-01-01T03:00:00+00:00', '/var/backups/a.tar.gz'
        );
        "#,
    )
    .unwrap();
}

#[test]
fn version_one_store_upgrades_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    write_v1_store(&path);

    let db = Database::open(&path).unwrap();
    db.with_conn(|conn| {
        assert_eq!(
            MigrationManager::current_version(conn).unwrap(),
            MigrationManager::latest_version()
        );

        // The legacy row survives and reads back as a files-kind artifact.
        let store = ArtifactStore::new(conn);
        let record = store.get("legacy-artifact").unwrap().unwrap();
        assert_eq!(record.kind(), bk_catalog::ArtifactKind::Files);
        assert_eq!(record.schedule, "daily");

        // The upgraded schema accepts volume-kind records.
        let volume = ArtifactRecord::new_volume(
            "nightly",
            "backitup-volume-pgdata-nightly-2024-06-04T09-00-00-000Z.tar.gz",
            10,
            "cafebabe",
            "pgdata",
            false,
        );
        store.insert(&volume).unwrap();
        Ok(())
    })
    .unwrap();

    // The migration backup was cleaned up after success.
    assert!(!Database::migration_backup_path(&path).exists());
}

#[test]
fn upgraded_store_reopens_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    write_v1_store(&path);
    drop(Database::open(&path).unwrap());

    let db = Database::open(&path).unwrap();
    db.with_conn(|conn| {
        let store = ArtifactStore::new(conn);
        assert!(store.get("legacy-artifact").unwrap().is_some());
        Ok(())
    })
    .unwrap();
}
