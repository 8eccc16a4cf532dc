//! SQLite persistence for history records.
//!
//! The repository only moves whole records in and out of the database; the
//! in-memory view and session scoping live in [`crate::HistoryStore`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use docent_core::error::DocentError;
use docent_core::types::{Bookmark, Message, Metadata, SearchRecord, SearchResult, Session};

use crate::db::Database;

/// Every persisted record, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct HistorySnapshot {
    pub sessions: Vec<Session>,
    pub messages: Vec<Message>,
    pub searches: Vec<SearchRecord>,
    pub bookmarks: Vec<Bookmark>,
}

/// Records to write in one transaction.
///
/// Sessions are upserted; the other records are insert-only and skipped if
/// already present, so writing the same batch twice is harmless.
#[derive(Debug, Default, Clone)]
pub struct HistoryBatch {
    pub sessions: Vec<Session>,
    pub messages: Vec<Message>,
    pub searches: Vec<SearchRecord>,
    pub bookmarks: Vec<Bookmark>,
}

impl HistoryBatch {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
            && self.messages.is_empty()
            && self.searches.is_empty()
            && self.bookmarks.is_empty()
    }
}

/// Repository for sessions, messages, searches and bookmarks.
#[derive(Clone)]
pub struct HistoryRepository {
    db: Arc<Database>,
}

impl HistoryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Read every record from the database.
    pub fn load_snapshot(&self) -> Result<HistorySnapshot, DocentError> {
        self.db.with_conn(|conn| {
            let sessions = collect_rows(
                conn,
                "SELECT id, name, created_at, last_active_at FROM sessions ORDER BY rowid ASC",
                row_to_session,
            )?;
            let messages = collect_rows(
                conn,
                "SELECT id, session_id, role, content, timestamp, metadata
                 FROM messages ORDER BY rowid ASC",
                row_to_message,
            )?;
            let searches = collect_rows(
                conn,
                "SELECT id, session_id, query, results_count, timestamp, metadata, documents
                 FROM searches ORDER BY rowid ASC",
                row_to_search,
            )?;
            let bookmarks = collect_rows(
                conn,
                "SELECT id, session_id, title, file_path, description, tags, timestamp
                 FROM bookmarks ORDER BY rowid ASC",
                row_to_bookmark,
            )?;

            Ok(HistorySnapshot {
                sessions,
                messages,
                searches,
                bookmarks,
            })
        })
    }

    /// Write a batch of records in a single transaction.
    pub fn persist(&self, batch: &HistoryBatch) -> Result<(), DocentError> {
        if batch.is_empty() {
            return Ok(());
        }

        self.db.transaction(|tx| {
            for s in &batch.sessions {
                tx.execute(
                    "INSERT INTO sessions (id, name, created_at, last_active_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET last_active_at = excluded.last_active_at",
                    params![
                        s.id.to_string(),
                        s.name,
                        s.created_at.timestamp_millis(),
                        s.last_active_at.timestamp_millis(),
                    ],
                )
                .map_err(|e| DocentError::Storage(format!("Failed to save session: {}", e)))?;
            }

            for m in &batch.messages {
                tx.execute(
                    "INSERT OR IGNORE INTO messages (id, session_id, role, content, timestamp, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        m.id.to_string(),
                        m.session_id.to_string(),
                        m.role.as_str(),
                        m.content,
                        m.timestamp.timestamp_millis(),
                        serde_json::to_string(&m.metadata)?,
                    ],
                )
                .map_err(|e| DocentError::Storage(format!("Failed to save message: {}", e)))?;
            }

            for r in &batch.searches {
                tx.execute(
                    "INSERT OR IGNORE INTO searches
                        (id, session_id, query, results_count, timestamp, metadata, documents)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        r.id.to_string(),
                        r.session_id.to_string(),
                        r.query,
                        r.results_count as i64,
                        r.timestamp.timestamp_millis(),
                        serde_json::to_string(&r.metadata)?,
                        serde_json::to_string(&r.documents)?,
                    ],
                )
                .map_err(|e| DocentError::Storage(format!("Failed to save search: {}", e)))?;
            }

            for b in &batch.bookmarks {
                tx.execute(
                    "INSERT OR IGNORE INTO bookmarks
                        (id, session_id, title, file_path, description, tags, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        b.id.to_string(),
                        b.session_id.to_string(),
                        b.title,
                        b.file_path,
                        b.description,
                        serde_json::to_string(&b.tags)?,
                        b.timestamp.timestamp_millis(),
                    ],
                )
                .map_err(|e| DocentError::Storage(format!("Failed to save bookmark: {}", e)))?;
            }
            Ok(())
        })
    }
}

// =============================================================================
// Row conversion
// =============================================================================

fn collect_rows<T>(
    conn: &rusqlite::Connection,
    sql: &str,
    convert: fn(&Row<'_>) -> Result<T, DocentError>,
) -> Result<Vec<T>, DocentError> {
    let mut stmt = conn.prepare(sql).map_err(storage_err)?;
    let rows = stmt
        .query_map([], |row| Ok(convert(row)))
        .map_err(storage_err)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(storage_err)??);
    }
    Ok(out)
}

fn row_to_session(row: &Row<'_>) -> Result<Session, DocentError> {
    Ok(Session {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage_err)?)?,
        name: row.get(1).map_err(storage_err)?,
        created_at: from_millis(row.get(2).map_err(storage_err)?)?,
        last_active_at: from_millis(row.get(3).map_err(storage_err)?)?,
    })
}

fn row_to_message(row: &Row<'_>) -> Result<Message, DocentError> {
    let role: String = row.get(2).map_err(storage_err)?;
    let metadata: String = row.get(5).map_err(storage_err)?;
    Ok(Message {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage_err)?)?,
        session_id: parse_uuid(&row.get::<_, String>(1).map_err(storage_err)?)?,
        role: role.parse().map_err(DocentError::Storage)?,
        content: row.get(3).map_err(storage_err)?,
        timestamp: from_millis(row.get(4).map_err(storage_err)?)?,
        metadata: serde_json::from_str::<Metadata>(&metadata)?,
    })
}

fn row_to_search(row: &Row<'_>) -> Result<SearchRecord, DocentError> {
    let results_count: i64 = row.get(3).map_err(storage_err)?;
    let metadata: String = row.get(5).map_err(storage_err)?;
    let documents: String = row.get(6).map_err(storage_err)?;
    Ok(SearchRecord {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage_err)?)?,
        session_id: parse_uuid(&row.get::<_, String>(1).map_err(storage_err)?)?,
        query: row.get(2).map_err(storage_err)?,
        results_count: results_count.max(0) as usize,
        timestamp: from_millis(row.get(4).map_err(storage_err)?)?,
        metadata: serde_json::from_str::<Metadata>(&metadata)?,
        documents: serde_json::from_str::<Vec<SearchResult>>(&documents)?,
    })
}

fn row_to_bookmark(row: &Row<'_>) -> Result<Bookmark, DocentError> {
    let tags: String = row.get(5).map_err(storage_err)?;
    Ok(Bookmark {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage_err)?)?,
        session_id: parse_uuid(&row.get::<_, String>(1).map_err(storage_err)?)?,
        title: row.get(2).map_err(storage_err)?,
        file_path: row.get(3).map_err(storage_err)?,
        description: row.get(4).map_err(storage_err)?,
        tags: serde_json::from_str::<BTreeSet<String>>(&tags)?,
        timestamp: from_millis(row.get(6).map_err(storage_err)?)?,
    })
}

fn storage_err(e: rusqlite::Error) -> DocentError {
    DocentError::Storage(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid, DocentError> {
    Uuid::parse_str(s).map_err(|e| DocentError::Storage(format!("Invalid UUID '{}': {}", s, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, DocentError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DocentError::Storage(format!("Invalid timestamp: {}", ms)))
}
