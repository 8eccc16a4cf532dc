use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form metadata attached to persisted records.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// =============================================================================
// Persisted records
// =============================================================================

/// A named conversation scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            created_at: now,
            last_active_at: now,
        }
    }
}

/// A single conversation turn. Immutable once appended to the history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    pub fn new(session_id: Uuid, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One executed document search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: Uuid,
    pub query: String,
    pub results_count: usize,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Documents returned, kept so later commands can refer to them by number.
    #[serde(default)]
    pub documents: Vec<SearchResult>,
}

impl SearchRecord {
    pub fn new(session_id: Uuid, query: &str, documents: Vec<SearchResult>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.to_string(),
            results_count: documents.len(),
            session_id,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
            documents,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Document by 1-based position, as listed to the user.
    pub fn document(&self, number: usize) -> Option<&SearchResult> {
        number.checked_sub(1).and_then(|i| self.documents.get(i))
    }
}

/// A document the user chose to keep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub title: String,
    pub file_path: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(
        session_id: Uuid,
        title: &str,
        file_path: &str,
        description: &str,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            file_path: file_path.to_string(),
            description: description.to_string(),
            tags: tags.into_iter().collect(),
            session_id,
            timestamp: Utc::now(),
        }
    }

    /// Bookmark a search result, tagging it with the query keywords.
    pub fn from_result(
        session_id: Uuid,
        result: &SearchResult,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::new(
            session_id,
            &result.title,
            &result.file_path,
            &result.content_preview,
            tags,
        )
    }
}

// =============================================================================
// Search documents
// =============================================================================

/// A ranked document returned by the search backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub id: String,
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub content_preview: String,
    #[serde(default)]
    pub relevance_score: f32,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

fn untitled() -> String {
    "Untitled".to_string()
}

impl SearchResult {
    /// Identity used to merge results of several keyword searches: id, else path.
    pub fn dedup_key(&self) -> &str {
        if self.id.is_empty() {
            &self.file_path
        } else {
            &self.id
        }
    }

    /// Cut `content_preview` to at most `max_chars` characters, adding "...".
    pub fn truncate_preview(&mut self, max_chars: usize) {
        self.content_preview = truncate_chars(&self.content_preview, max_chars);
    }
}

/// Truncate on a character boundary, appending "..." when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
