//! Shared SQLite connection.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::repositories;

/// A shared SQLite connection. Cloning is cheap; clones share the same
/// connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open or create a database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        };
        db.init_schema()?;
        info!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True when both handles share one connection.
    pub fn same_as(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            repositories::session::init_schema(conn)?;
            repositories::agent::init_schema(conn)?;
            repositories::server::init_schema(conn)?;
            repositories::request_log::init_schema(conn)?;
            repositories::settings::init_schema(conn)?;
            repositories::workspace::init_schema(conn)?;
            debug!("schema initialised");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('chat_sessions', 'agents', 'servers', 'request_logs', 'settings', 'workspaces')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 6);
        assert!(db.path().is_none());
    }

    #[test]
    fn open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mcprouter.db");
        let db = Database::open(&path, Duration::from_millis(1000)).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));
    }

    #[test]
    fn clones_share_connection() {
        let a = Database::open_in_memory().unwrap();
        let b = a.clone();
        let c = Database::open_in_memory().unwrap();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
