//! Forward-only schema migration management.
//!
//! Migrations are an ordered list of `(version, SQL)` pairs with strictly
//! increasing, contiguous versions. Each pending migration runs inside its
//! own transaction and appends a row to the `schema_version` table on
//! success. The surrounding file backup/restore protocol lives in
//! [`crate::connection::Database::open`].

use chrono::Utc;
use rusqlite::{params, Connection};

/// A single schema migration step.
///
/// The SQL must transform a schema at `version - 1` into a schema at
/// `version`. Statements are separated by `;`.
pub struct Migration {
    pub version: u32,
    pub sql: &'static str,
}

/// Ordered migration list. Versions are strictly increasing and contiguous
/// starting at 1.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS backups (
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

            CREATE TABLE IF NOT EXISTS deletion_log (
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

            CREATE INDEX IF NOT EXISTS idx_backups_schedule_status
                ON backups(schedule, status);
            CREATE INDEX IF NOT EXISTS idx_deletion_log_artifact
                ON deletion_log(artifact_id)
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
            ALTER TABLE backups ADD COLUMN kind TEXT NOT NULL DEFAULT 'files';
            ALTER TABLE backups ADD COLUMN volume_name TEXT;
            ALTER TABLE backups ADD COLUMN volume_in_use INTEGER NOT NULL DEFAULT 0;
            CREATE INDEX IF NOT EXISTS idx_backups_kind_status
                ON backups(kind, status)
        "#,
    },
];

/// Schema migration manager.
pub struct MigrationManager;

impl MigrationManager {
    /// The version the schema reaches after all migrations have applied.
    pub fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    /// Read the store's current schema version. An absent version table
    /// means version 0.
    pub fn current_version(conn: &Connection) -> crate::Result<u32> {
        let table_exists: bool = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![crate::schema::TABLE_SCHEMA_VERSION],
            |row| row.get::<_, i64>(0).map(|n| n > 0),
        )?;
        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_version", params![], |row| {
                row.get(0)
            })?;
        Ok(version.unwrap_or(0))
    }

    /// Apply every migration with a version greater than the store's current
    /// version. Each migration runs in its own transaction and records its
    /// applied-version row before committing.
    pub fn migrate(conn: &mut Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            "#,
        )?;

        let current = Self::current_version(conn)?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            tracing::info!(version = migration.version, "applying catalog migration");
            let tx = conn.transaction()?;
            for statement in migration.sql.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                tx.execute(statement, params![])?;
            }
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
                params![migration.version, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as u32 + 1);
        }
        assert_eq!(MigrationManager::latest_version(), crate::schema::SCHEMA_VERSION);
    }

    #[test]
    fn fresh_store_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(MigrationManager::current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn migrate_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationManager::migrate(&mut conn).unwrap();
        assert_eq!(
            MigrationManager::current_version(&conn).unwrap(),
            MigrationManager::latest_version()
        );
    }

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationManager::migrate(&mut conn).unwrap();
        MigrationManager::migrate(&mut conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", params![], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, MigrationManager::latest_version() as i64);
    }

    #[test]
    fn applied_rows_carry_timestamps() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationManager::migrate(&mut conn).unwrap();

        let ts: String = conn
            .query_row(
                "SELECT applied_at FROM schema_version WHERE version = 1",
                params![],
                |row| row.get(0),
            )
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
