//! Catalog database connection management.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::migrations::MigrationManager;

/// Catalog database handle.
///
/// Wraps a single SQLite connection behind a mutex; all catalog access in
/// the agent is mediated through this lock.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<std::sync::Mutex<Connection>>,
}

impl Database {
    /// Open or create the catalog store at the given path.
    ///
    /// Enables write-ahead logging and foreign-key enforcement, then brings
    /// the schema to the latest version. If any migration is pending, the
    /// store file is first copied to a sibling backup path; on migration
    /// failure the original file is restored from that backup and the open
    /// fails with a rollback error.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        Self::configure(&conn)?;

        let current = MigrationManager::current_version(&conn)?;
        let latest = MigrationManager::latest_version();
        if current < latest {
            let backup = Self::migration_backup_path(path);
            std::fs::copy(path, &backup)?;

            match MigrationManager::migrate(&mut conn) {
                Ok(()) => {
                    let _ = std::fs::remove_file(&backup);
                }
                Err(e) => {
                    // Close the connection before restoring the file.
                    drop(conn);
                    let restore = std::fs::copy(&backup, path).and_then(|_| {
                        // WAL sidecars would resurrect the failed state.
                        let _ = std::fs::remove_file(Self::sidecar_path(path, "-wal"));
                        let _ = std::fs::remove_file(Self::sidecar_path(path, "-shm"));
                        std::fs::remove_file(&backup)
                    });
                    if let Err(restore_err) = restore {
                        tracing::error!(
                            path = %path.display(),
                            error = %restore_err,
                            "failed to restore catalog from migration backup"
                        );
                    }
                    return Err(crate::Error::migration_rollback(latest, e.to_string()));
                }
            }
        }

        Ok(Self {
            connection: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    /// Open an in-memory catalog for testing.
    pub fn open_in_memory() -> crate::Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        MigrationManager::migrate(&mut conn)?;
        Ok(Self {
            connection: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    fn configure(conn: &Connection) -> crate::Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Sibling path the store file is copied to before migrations run.
    pub fn migration_backup_path(path: &Path) -> PathBuf {
        Self::sidecar_path(path, ".migration-backup")
    }

    fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        path.with_file_name(name)
    }

    /// Get a reference to the underlying connection mutex.
    pub fn connection(&self) -> &std::sync::Mutex<Connection> {
        &self.connection
    }

    /// Run `f` against the locked connection.
    pub fn with_conn<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self
            .connection
            .lock()
            .map_err(|e| crate::Error::generic(format!("failed to acquire catalog lock: {}", e)))?;
        f(&conn)
    }

    /// Execute a transaction with automatic rollback on error.
    pub fn transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self
            .connection
            .lock()
            .map_err(|e| crate::Error::generic(format!("failed to acquire catalog lock: {}", e)))?;

        let tx = conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}
