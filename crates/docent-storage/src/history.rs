//! Session-scoped conversation, search and bookmark history.
//!
//! The store keeps every record in memory and flushes new ones to SQLite on
//! [`HistoryStore::save`]. Reads and writes are scoped to the current
//! session; other sessions stay loaded and are persisted alongside it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use docent_core::error::DocentError;
use docent_core::types::{Bookmark, Message, Metadata, Role, SearchRecord, SearchResult, Session};

use crate::db::Database;
use crate::repository::{HistoryBatch, HistoryRepository};

/// Outcome of [`HistoryStore::switch_session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSwitch {
    Existing,
    Created,
}

/// How many records of each kind are already on disk.
#[derive(Debug, Default, Clone, Copy)]
struct Flushed {
    messages: usize,
    searches: usize,
    bookmarks: usize,
}

/// In-memory history backed by SQLite.
pub struct HistoryStore {
    repo: HistoryRepository,
    session_name: String,
    loaded: bool,
    current: usize,
    sessions: Vec<Session>,
    messages: Vec<Message>,
    searches: Vec<SearchRecord>,
    bookmarks: Vec<Bookmark>,
    flushed: Flushed,
}

impl HistoryStore {
    /// Create a store that will open `session_name` on first use.
    pub fn new(db: Arc<Database>, session_name: &str) -> Self {
        let name = session_name.trim();
        Self {
            repo: HistoryRepository::new(db),
            session_name: if name.is_empty() { "default".to_string() } else { name.to_string() },
            loaded: false,
            current: 0,
            sessions: Vec::new(),
            messages: Vec::new(),
            searches: Vec::new(),
            bookmarks: Vec::new(),
            flushed: Flushed::default(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Populate the store from disk. Repeated calls are no-ops.
    pub async fn load(&mut self) -> Result<(), DocentError> {
        if self.loaded {
            return Ok(());
        }

        let repo = self.repo.clone();
        let snapshot = tokio::task::spawn_blocking(move || repo.load_snapshot())
            .await
            .map_err(|e| DocentError::Storage(format!("History load task failed: {}", e)))??;

        self.flushed = Flushed {
            messages: snapshot.messages.len(),
            searches: snapshot.searches.len(),
            bookmarks: snapshot.bookmarks.len(),
        };
        self.sessions = snapshot.sessions;
        self.messages = snapshot.messages;
        self.searches = snapshot.searches;
        self.bookmarks = snapshot.bookmarks;

        let name = self.session_name.clone();
        self.current = self.find_or_create(&name).0;
        self.loaded = true;

        info!(
            session = %self.session_name,
            sessions = self.sessions.len(),
            messages = self.messages.len(),
            "History loaded"
        );
        Ok(())
    }

    /// Flush records added since the last save. Safe to call repeatedly.
    pub async fn save(&mut self) -> Result<(), DocentError> {
        if !self.loaded {
            return Ok(());
        }

        let batch = HistoryBatch {
            sessions: self.sessions.clone(),
            messages: self.messages[self.flushed.messages..].to_vec(),
            searches: self.searches[self.flushed.searches..].to_vec(),
            bookmarks: self.bookmarks[self.flushed.bookmarks..].to_vec(),
        };
        let pending = Flushed {
            messages: self.messages.len(),
            searches: self.searches.len(),
            bookmarks: self.bookmarks.len(),
        };

        let repo = self.repo.clone();
        tokio::task::spawn_blocking(move || repo.persist(&batch))
            .await
            .map_err(|e| DocentError::Storage(format!("History save task failed: {}", e)))??;

        debug!(
            messages = pending.messages - self.flushed.messages,
            searches = pending.searches - self.flushed.searches,
            bookmarks = pending.bookmarks - self.flushed.bookmarks,
            "History saved"
        );
        self.flushed = pending;
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append a conversation turn to the current session.
    pub async fn add_message(
        &mut self,
        role: Role,
        content: &str,
        metadata: Metadata,
    ) -> Result<Message, DocentError> {
        self.load().await?;
        let message = Message::new(self.session_id(), role, content).with_metadata(metadata);
        self.touch();
        self.messages.push(message.clone());
        Ok(message)
    }

    /// Record an executed search in the current session.
    pub async fn add_search(
        &mut self,
        query: &str,
        documents: Vec<SearchResult>,
        metadata: Metadata,
    ) -> Result<SearchRecord, DocentError> {
        self.load().await?;
        let record = SearchRecord::new(self.session_id(), query, documents).with_metadata(metadata);
        self.touch();
        self.searches.push(record.clone());
        Ok(record)
    }

    /// Bookmark a document in the current session.
    pub async fn add_bookmark(
        &mut self,
        result: &SearchResult,
        tags: Vec<String>,
    ) -> Result<Bookmark, DocentError> {
        self.load().await?;
        let bookmark = Bookmark::from_result(self.session_id(), result, tags);
        self.touch();
        self.bookmarks.push(bookmark.clone());
        Ok(bookmark)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The last `n` messages of the current session, oldest first.
    pub async fn recent_messages(&mut self, n: usize) -> Result<Vec<Message>, DocentError> {
        self.load().await?;
        let sid = self.session_id();
        let mut recent: Vec<Message> = self
            .messages
            .iter()
            .rev()
            .filter(|m| m.session_id == sid)
            .take(n)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    /// The last `n` searches of the current session, newest first.
    pub async fn recent_searches(&mut self, n: usize) -> Result<Vec<SearchRecord>, DocentError> {
        self.load().await?;
        let sid = self.session_id();
        Ok(self
            .searches
            .iter()
            .rev()
            .filter(|s| s.session_id == sid)
            .take(n)
            .cloned()
            .collect())
    }

    pub async fn last_search(&mut self) -> Result<Option<SearchRecord>, DocentError> {
        Ok(self.recent_searches(1).await?.into_iter().next())
    }

    /// Most frequent queries of the current session with their counts.
    ///
    /// Queries are compared trimmed and case-insensitively; ties keep the
    /// order in which the queries were first seen.
    pub async fn popular_queries(&mut self, k: usize) -> Result<Vec<(String, usize)>, DocentError> {
        self.load().await?;
        let sid = self.session_id();

        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (seen, record) in self.searches.iter().filter(|s| s.session_id == sid).enumerate() {
            let key = record.query.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            counts.entry(key).or_insert((0, seen)).0 += 1;
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(query, (count, first))| (query, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(query, count, _)| (query, count))
            .collect())
    }

    /// Bookmarks of the current session, oldest first.
    pub async fn bookmarks(&mut self) -> Result<Vec<Bookmark>, DocentError> {
        self.load().await?;
        let sid = self.session_id();
        Ok(self
            .bookmarks
            .iter()
            .filter(|b| b.session_id == sid)
            .cloned()
            .collect())
    }

    pub async fn message_count(&mut self) -> Result<usize, DocentError> {
        self.load().await?;
        let sid = self.session_id();
        Ok(self.messages.iter().filter(|m| m.session_id == sid).count())
    }

    pub async fn search_count(&mut self) -> Result<usize, DocentError> {
        self.load().await?;
        let sid = self.session_id();
        Ok(self.searches.iter().filter(|s| s.session_id == sid).count())
    }

    /// All known sessions in creation order.
    pub async fn sessions(&mut self) -> Result<Vec<Session>, DocentError> {
        self.load().await?;
        Ok(self.sessions.clone())
    }

    pub async fn current_session(&mut self) -> Result<Session, DocentError> {
        self.load().await?;
        Ok(self.sessions[self.current].clone())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Make `name` the current session, creating it if it does not exist.
    ///
    /// Names match case-insensitively.
    pub async fn switch_session(&mut self, name: &str) -> Result<SessionSwitch, DocentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DocentError::Session("Session name must not be empty".to_string()));
        }

        self.load().await?;
        let (index, outcome) = self.find_or_create(name);
        self.current = index;
        self.session_name = self.sessions[index].name.clone();

        info!(session = %self.session_name, ?outcome, "Switched session");
        Ok(outcome)
    }

    fn find_or_create(&mut self, name: &str) -> (usize, SessionSwitch) {
        let wanted = name.to_lowercase();
        if let Some(index) = self
            .sessions
            .iter()
            .position(|s| s.name.to_lowercase() == wanted)
        {
            return (index, SessionSwitch::Existing);
        }
        self.sessions.push(Session::new(name));
        (self.sessions.len() - 1, SessionSwitch::Created)
    }

    fn session_id(&self) -> uuid::Uuid {
        self.sessions[self.current].id
    }

    fn touch(&mut self) {
        self.sessions[self.current].last_active_at = Utc::now();
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("session", &self.session_name)
            .field("loaded", &self.loaded)
            .field("messages", &self.messages.len())
            .field("searches", &self.searches.len())
            .finish()
    }
}
