//! Database schema migrations.
//!
//! Applies the history schema: sessions, messages, searches, bookmarks and
//! the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use docent_core::error::DocentError;

/// Latest schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending database migrations and return the resulting version.
pub fn run_migrations(conn: &Connection) -> Result<i64, DocentError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DocentError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| DocentError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: history_schema");
    }

    Ok(SCHEMA_VERSION)
}

/// Version 1: history schema.
fn apply_v1(conn: &Connection) -> Result<(), DocentError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id              TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at      INTEGER NOT NULL,
            last_active_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY NOT NULL,
            session_id      TEXT NOT NULL,
            role            TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content         TEXT NOT NULL,
            timestamp       INTEGER NOT NULL,
            metadata        TEXT NOT NULL DEFAULT '{}',
            FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages (session_id, timestamp ASC);

        CREATE TABLE IF NOT EXISTS searches (
            id              TEXT PRIMARY KEY NOT NULL,
            session_id      TEXT NOT NULL,
            query           TEXT NOT NULL,
            results_count   INTEGER NOT NULL DEFAULT 0,
            timestamp       INTEGER NOT NULL,
            metadata        TEXT NOT NULL DEFAULT '{}',
            documents       TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_searches_session
            ON searches (session_id, timestamp DESC);

        CREATE TABLE IF NOT EXISTS bookmarks (
            id              TEXT PRIMARY KEY NOT NULL,
            session_id      TEXT NOT NULL,
            title           TEXT NOT NULL,
            file_path       TEXT NOT NULL DEFAULT '',
            description     TEXT NOT NULL DEFAULT '',
            tags            TEXT NOT NULL DEFAULT '[]',
            timestamp       INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_bookmarks_session
            ON bookmarks (session_id, timestamp DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'history_schema');
        ",
    )
    .map_err(|e| DocentError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(run_migrations(&conn).unwrap(), SCHEMA_VERSION);
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_role_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, name, created_at, last_active_at) VALUES ('s', 'default', 0, 0)",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO messages (id, session_id, role, content, timestamp)
             VALUES ('m', 's', 'system', 'hi', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_session_names_unique_case_insensitive() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, name, created_at, last_active_at) VALUES ('a', 'Work', 0, 0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO sessions (id, name, created_at, last_active_at) VALUES ('b', 'work', 0, 0)",
            [],
        );
        assert!(dup.is_err());
    }
}
