//! SQLite handle for the history database.
//!
//! One connection behind a Mutex, shared by the history store through an
//! `Arc`. Opening runs all pending migrations.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use docent_core::error::DocentError;

use crate::migrations;

/// How long a statement waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
    location: Location,
}

impl Database {
    /// Open (or create) the history database at `path`, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, DocentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| DocentError::Storage(format!("Failed to open database: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DocentError::Storage(format!("Failed to set busy timeout: {}", e)))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| DocentError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("History database opened at {}", path.display());
        Self::init(conn, Location::File(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, DocentError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocentError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::init(conn, Location::Memory)
    }

    fn init(conn: Connection, location: Location) -> Result<Self, DocentError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DocentError::Storage(format!("Failed to enable foreign keys: {}", e)))?;
        let db = Self {
            conn: Mutex::new(conn),
            location,
        };
        let version = db.with_conn(migrations::run_migrations)?;
        debug!(version, "History schema ready");
        Ok(db)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DocentError>
    where
        F: FnOnce(&Connection) -> Result<T, DocentError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`, rolls
    /// back otherwise.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, DocentError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DocentError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| DocentError::Storage(format!("Failed to begin transaction: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| DocentError::Storage(format!("Failed to commit: {}", e)))?;
        Ok(value)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DocentError> {
        self.conn
            .lock()
            .map_err(|e| DocentError::Storage(format!("Database lock poisoned: {}", e)))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .map_err(|e| DocentError::Storage(e.to_string()))
        })
        .unwrap()
    }

    fn insert_session(tx: &Transaction<'_>, id: &str) -> Result<(), DocentError> {
        tx.execute(
            "INSERT INTO sessions (id, name, created_at, last_active_at) VALUES (?1, ?1, 0, 0)",
            [id],
        )
        .map(|_| ())
        .map_err(|e| DocentError::Storage(e.to_string()))
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.location(), &Location::Memory);
        assert_eq!(count(&db, "messages"), 0);
        assert_eq!(count(&db, "sessions"), 0);
    }

    #[test]
    fn test_file_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docent.db");
        let db = Database::new(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.location(), &Location::File(path.clone()));
        assert_eq!(count(&db, "searches"), 0);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docent.db");
        drop(Database::new(&path).unwrap());
        let db = Database::new(&path).unwrap();
        assert_eq!(count(&db, "schema_migrations"), 1);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = Database::in_memory().unwrap();
        db.transaction(|tx| insert_session(tx, "a")).unwrap();
        assert_eq!(count(&db, "sessions"), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), DocentError> = db.transaction(|tx| {
            insert_session(tx, "a")?;
            Err(DocentError::Storage("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count(&db, "sessions"), 0);
    }

    #[test]
    fn test_debug_shows_location() {
        let db = Database::in_memory().unwrap();
        assert_eq!(format!("{:?}", db), "Database { location: Memory }");
    }
}
