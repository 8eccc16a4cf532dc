//! Slash command parsing and handlers.

use std::collections::HashSet;
use std::fmt::Write;

use tracing::{info, warn};

use docent_core::types::SearchResult;
use docent_core::Theme;
use docent_storage::SessionSwitch;

use crate::classifier::{extract_keywords, similarity};
use crate::error::ChatError;
use crate::pipeline::{ChatPipeline, SEARCH_RETRIES};
use crate::remote::SearchFilters;
use crate::response::{analysis_prompt, apology_for};
use crate::retry::{run_with_retry, OperationKind, RetryPolicy};

pub const NO_SEARCHES_TO_BOOKMARK: &str = "No searches found to bookmark from.";
pub const BOOKMARK_USAGE: &str = "Invalid command. Use /bookmark <id>.";
pub const BOOKMARK_NOT_FOUND: &str = "Doc ID not found in the last search.";
pub const NO_SEARCH_HISTORY: &str = "No search history found.";
pub const NO_ANALYTICS: &str = "No analytics data available.";

/// Keyword searches issued by `/similar`.
const SIMILAR_KEYWORDS: usize = 3;
/// Documents listed by `/similar`.
const SIMILAR_LIMIT: usize = 5;
/// Topics listed by `/analyze`.
const ANALYZE_TOPICS: usize = 10;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Theme(Option<String>),
    Bookmark(String),
    History,
    Sessions(Option<String>),
    Analytics,
    Preview(String),
    Similar(String),
    Analyze(String),
    Unknown(String),
}

impl Command {
    /// Map a lower-cased command name and its raw args to a command.
    pub fn parse(name: &str, args: &str) -> Self {
        let args = args.trim();
        let optional = || (!args.is_empty()).then(|| args.to_string());
        match name {
            "help" => Command::Help,
            "theme" => Command::Theme(optional()),
            "bookmark" => Command::Bookmark(args.to_string()),
            "history" => Command::History,
            "sessions" | "session" => Command::Sessions(optional()),
            "analytics" => Command::Analytics,
            "preview" => Command::Preview(args.to_string()),
            "similar" => Command::Similar(args.to_string()),
            "analyze" => Command::Analyze(args.to_string()),
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Fixed help text listing every command.
pub fn help_text() -> String {
    format!(
        "Available commands:\n\
         • /help - Show this help message\n\
         • /theme [theme_name] - Change visual theme ({})\n\
         • /bookmark <id> - Bookmark a result of the last search\n\
         • /preview <id> - Show a result of the last search\n\
         • /similar <text> - Find documents similar to a text\n\
         • /analyze <path> - Summarize a document and list its key topics\n\
         • /history - Show recent search history\n\
         • /sessions [name] - Show sessions, or switch to one (created if new)\n\
         • /analytics - Show usage analytics\n\
         • /exit - Exit the application\n\
         \n\
         You can also chat naturally! Ask questions like:\n\
         • \"Tell me about quantum computing\"\n\
         • \"Find documents about machine learning\"\n\
         • \"Search for Python tutorials\"",
        Theme::names()
    )
}

fn parse_doc_number(args: &str) -> Option<usize> {
    args.split_whitespace().next()?.parse().ok()
}

impl ChatPipeline {
    /// Execute a slash command and return its reply text.
    pub(crate) async fn run_command(&mut self, command: Command) -> String {
        match command {
            Command::Help => help_text(),
            Command::Theme(name) => self.theme_command(name.as_deref()),
            Command::Bookmark(args) => self.bookmark_command(&args).await,
            Command::History => self.history_command().await,
            Command::Sessions(name) => self.sessions_command(name.as_deref()).await,
            Command::Analytics => self.analytics_command().await,
            Command::Preview(args) => self.preview_command(&args).await,
            Command::Similar(text) => self.similar_command(&text).await,
            Command::Analyze(path) => self.analyze_command(&path).await,
            Command::Unknown(name) => format!(
                "Unknown command: {}. Type /help for available commands.",
                name
            ),
        }
    }

    // -----------------------------------------------------------------
    // Theme
    // -----------------------------------------------------------------

    fn theme_command(&mut self, name: Option<&str>) -> String {
        let Some(name) = name else {
            return format!(
                "Current theme: {}. Available themes: {}.",
                self.theme,
                Theme::names()
            );
        };
        match name.parse::<Theme>() {
            Ok(theme) => {
                self.theme = theme;
                info!(theme = %theme, "Theme switched");
                format!("Theme switched to {}.", theme)
            }
            Err(_) => format!(
                "Unknown theme '{}'. Available themes: {}.",
                name,
                Theme::names()
            ),
        }
    }

    // -----------------------------------------------------------------
    // Bookmarks and previews
    // -----------------------------------------------------------------

    async fn bookmark_command(&mut self, args: &str) -> String {
        let Some(number) = parse_doc_number(args) else {
            return BOOKMARK_USAGE.to_string();
        };

        let last = match self.store.last_search().await {
            Ok(Some(search)) => search,
            Ok(None) => return NO_SEARCHES_TO_BOOKMARK.to_string(),
            Err(e) => return apology_for(&e.into()),
        };
        let Some(document) = last.document(number) else {
            return BOOKMARK_NOT_FOUND.to_string();
        };

        let tags = extract_keywords(&last.query);
        match self.store.add_bookmark(document, tags).await {
            Ok(bookmark) => format!("Bookmarked: {}", bookmark.title),
            Err(e) => {
                warn!(error = %e, "Failed to add bookmark");
                apology_for(&e.into())
            }
        }
    }

    async fn preview_command(&mut self, args: &str) -> String {
        let Some(number) = parse_doc_number(args) else {
            return "Invalid command. Use /preview <id>.".to_string();
        };

        let last = match self.store.last_search().await {
            Ok(Some(search)) => search,
            Ok(None) => return NO_SEARCH_HISTORY.to_string(),
            Err(e) => return apology_for(&e.into()),
        };
        match last.document(number) {
            Some(doc) => {
                let mut text = format!("{}\n", doc.title);
                if !doc.file_path.is_empty() {
                    let _ = writeln!(text, "{}", doc.file_path);
                }
                let _ = write!(text, "\n{}", doc.content_preview);
                text
            }
            None => "Doc not found in last search results.".to_string(),
        }
    }

    // -----------------------------------------------------------------
    // History, sessions, analytics
    // -----------------------------------------------------------------

    async fn history_command(&mut self) -> String {
        let limit = self.config.history.recent_searches;
        match self.store.recent_searches(limit).await {
            Ok(searches) if searches.is_empty() => NO_SEARCH_HISTORY.to_string(),
            Ok(searches) => {
                let mut text = String::from("Recent searches:\n");
                for search in searches {
                    let _ = writeln!(text, "• {} ({} results)", search.query, search.results_count);
                }
                text
            }
            Err(e) => {
                warn!(error = %e, "Failed to read search history");
                NO_SEARCH_HISTORY.to_string()
            }
        }
    }

    async fn sessions_command(&mut self, name: Option<&str>) -> String {
        if let Some(name) = name {
            return match self.store.switch_session(name).await {
                Ok(SessionSwitch::Existing) => format!("Switched to session '{}'.", name),
                Ok(SessionSwitch::Created) => {
                    format!("Created and switched to session '{}'.", name)
                }
                Err(e) => apology_for(&e.into()),
            };
        }

        let current = match self.store.current_session().await {
            Ok(session) => session.id,
            Err(e) => return apology_for(&e.into()),
        };
        match self.store.sessions().await {
            Ok(sessions) if sessions.is_empty() => "No sessions found.".to_string(),
            Ok(sessions) => {
                let mut text = String::from("Available sessions:\n");
                for session in sessions {
                    let marker = if session.id == current { " (current)" } else { "" };
                    let _ = writeln!(text, "• {}{}", session.name, marker);
                }
                text
            }
            Err(e) => apology_for(&e.into()),
        }
    }

    async fn analytics_command(&mut self) -> String {
        match self.collect_analytics().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Analytics unavailable");
                NO_ANALYTICS.to_string()
            }
        }
    }

    async fn collect_analytics(&mut self) -> Result<String, ChatError> {
        let searches = self.store.search_count().await?;
        let popular = self
            .store
            .popular_queries(self.config.history.popular_queries)
            .await?;
        let bookmarks = self.store.bookmarks().await?.len();
        let messages = self.store.message_count().await?;
        let session = self.store.current_session().await?;

        let popular = if popular.is_empty() {
            "None".to_string()
        } else {
            popular
                .iter()
                .map(|(query, count)| format!("{} ({})", query, count))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Ok(format!(
            "📊 Usage Analytics:\n\n\
             🔍 Search Activity:\n\
             • Total searches: {}\n\
             • Popular queries: {}\n\n\
             📑 Bookmarks:\n\
             • Total bookmarks: {}\n\n\
             💬 Current Session:\n\
             • Session: {}\n\
             • Messages: {}",
            searches, popular, bookmarks, session.name, messages
        ))
    }

    // -----------------------------------------------------------------
    // Remote-backed commands
    // -----------------------------------------------------------------

    async fn similar_command(&mut self, reference: &str) -> String {
        if reference.trim().is_empty() {
            return "Invalid command. Use /similar <text>.".to_string();
        }
        let keywords = extract_keywords(reference);
        if keywords.is_empty() {
            return "No keywords found to compare against.".to_string();
        }

        let policy = RetryPolicy::for_kind(&self.config, OperationKind::Lookup)
            .with_max_retries(SEARCH_RETRIES);
        let filters = SearchFilters::default();
        let mut seen = HashSet::new();
        let mut ranked: Vec<(f32, SearchResult)> = Vec::new();

        for keyword in keywords.iter().take(SIMILAR_KEYWORDS) {
            let search = self.search.clone();
            let found = run_with_retry(&policy, || {
                let search = search.clone();
                let filters = filters.clone();
                let keyword = keyword.clone();
                async move { search.search(&keyword, &filters).await }
            })
            .await;

            match found {
                Ok(results) => {
                    for doc in results {
                        if seen.insert(doc.dedup_key().to_string()) {
                            let score = similarity(reference, &doc.content_preview);
                            ranked.push((score, doc));
                        }
                    }
                }
                Err(e) => warn!(keyword = %keyword, error = %e, "Similarity search failed"),
            }
        }

        if ranked.is_empty() {
            return "No similar documents found.".to_string();
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut text = String::from("Similar documents:\n");
        for (i, (score, doc)) in ranked.iter().take(SIMILAR_LIMIT).enumerate() {
            let _ = writeln!(text, "{}. **{}** (similarity {:.2})", i + 1, doc.title, score);
            if !doc.file_path.is_empty() {
                let _ = writeln!(text, "   {}", doc.file_path);
            }
        }
        text
    }

    async fn analyze_command(&mut self, file_path: &str) -> String {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            return "Invalid command. Use /analyze <path>.".to_string();
        }

        let policy =
            RetryPolicy::for_kind(&self.config, OperationKind::Conversation).with_max_retries(0);
        let prompt = analysis_prompt(file_path);
        let model = self.model.clone();
        let result = run_with_retry(&policy, || model.run(&prompt, &[])).await;

        match result {
            Ok(summary) => {
                let topics: Vec<String> = extract_keywords(&summary)
                    .into_iter()
                    .take(ANALYZE_TOPICS)
                    .collect();
                let topics = if topics.is_empty() {
                    "None".to_string()
                } else {
                    topics.join(", ")
                };
                format!(
                    "Analysis of {}:\n\n{}\n\nKey topics: {}",
                    file_path, summary, topics
                )
            }
            Err(e) => {
                let err: ChatError = e.into();
                warn!(path = %file_path, error = %err, "Document analysis failed");
                apology_for(&err)
            }
        }
    }
}
