//! The response pipeline.
//!
//! Classifies a message, dispatches it to the search, command or
//! conversation path, bounds every remote call with the retry controller,
//! and records the exchange in the history store. Remote and storage
//! failures degrade to apologetic replies; they never reach the caller.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use docent_core::types::{Message, Metadata, Role, SearchResult};
use docent_core::{DocentConfig, DocentError, Theme};
use docent_storage::HistoryStore;

use crate::classifier::{classify, Intent, IntentResult};
use crate::commands::Command;
use crate::error::ChatError;
use crate::remote::{DocumentSearch, ModelClient, SearchFilters};
use crate::response::{
    apology_for, conversation_prompt, error_apology, format_search_reply,
    recommendation_prompt, TIMEOUT_APOLOGY,
};
use crate::retry::{run_with_retry, OperationKind, RetryPolicy};

/// Retries after the first search attempt.
pub const SEARCH_RETRIES: u32 = 2;

// =============================================================================
// Replies
// =============================================================================

/// Reply to one user message.
pub enum Reply {
    Text(String),
    Search(SearchReply),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Search(search) => &search.text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Text(text) => text,
            Reply::Search(search) => search.text,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Reply::Search(search) => f.debug_tuple("Search").field(search).finish(),
        }
    }
}

/// Successful search with its documents.
///
/// `recommendation` resolves to a short follow-up suggestion from the model,
/// or `None` if it could not be produced in time. It is only started when
/// awaited.
pub struct SearchReply {
    pub query: String,
    pub documents: Vec<SearchResult>,
    pub text: String,
    pub recommendation: Option<BoxFuture<'static, Option<String>>>,
}

impl fmt::Debug for SearchReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchReply")
            .field("query", &self.query)
            .field("documents", &self.documents.len())
            .field("text", &self.text)
            .field("recommendation", &self.recommendation.is_some())
            .finish()
    }
}

// =============================================================================
// ChatPipeline
// =============================================================================

/// Single-conversation response pipeline.
///
/// Methods take `&mut self`, so a pipeline serves one request at a time.
pub struct ChatPipeline {
    pub(crate) config: Arc<DocentConfig>,
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) search: Arc<dyn DocumentSearch>,
    pub(crate) store: HistoryStore,
    pub(crate) theme: Theme,
}

impl ChatPipeline {
    pub fn new(
        config: Arc<DocentConfig>,
        model: Arc<dyn ModelClient>,
        search: Arc<dyn DocumentSearch>,
        store: HistoryStore,
    ) -> Self {
        let theme = config.ui.theme.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid theme in configuration, using default");
            Theme::default()
        });
        Self {
            config,
            model,
            search,
            store,
            theme,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn config(&self) -> &DocentConfig {
        &self.config
    }

    pub fn store(&mut self) -> &mut HistoryStore {
        &mut self.store
    }

    /// Flush history to disk.
    pub async fn save(&mut self) -> Result<(), DocentError> {
        self.store.save().await
    }

    /// Reply text for `message`, discarding any search recommendation.
    pub async fn generate_response(&mut self, message: &str) -> String {
        self.respond(message).await.into_text()
    }

    /// Full reply for `message`.
    pub async fn respond(&mut self, message: &str) -> Reply {
        let context = self.load_context().await;
        if let Err(e) = &context {
            warn!(error = %e, "Could not load context for classification");
        }
        let intent = classify(message, context.as_deref().unwrap_or(&[]));
        info!(intent = %intent.kind(), confidence = intent.confidence, "Classified message");

        match intent.intent.clone() {
            Intent::Search { query, keywords } => self.handle_search(&query, &keywords, &intent).await,
            Intent::Command { name, args } => Reply::Text(self.handle_command(&name, &args).await),
            Intent::Bookmark { query } | Intent::Conversation { query } => {
                Reply::Text(self.handle_conversation(&query, &intent, context).await)
            }
        }
    }

    // -----------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------

    async fn handle_search(
        &mut self,
        query: &str,
        keywords: &[String],
        intent: &IntentResult,
    ) -> Reply {
        self.record_turn(Role::User, query, intent_metadata(intent)).await;

        let policy =
            RetryPolicy::for_kind(&self.config, OperationKind::Lookup).with_max_retries(SEARCH_RETRIES);
        let search = self.search.clone();
        let filters = SearchFilters::default();
        let result = run_with_retry(&policy, || {
            let search = search.clone();
            let filters = filters.clone();
            let query = query.to_string();
            async move { search.search(&query, &filters).await }
        })
        .await;

        let documents = match result {
            Ok(documents) => documents,
            Err(e) => {
                let err: ChatError = e.into();
                warn!(error = %err, "Search failed");
                return Reply::Text(apology_for(&err));
            }
        };

        let text = format_search_reply(&documents, self.config.search.max_results_shown);

        let mut metadata = Metadata::new();
        metadata.insert("keywords".to_string(), serde_json::json!(keywords));
        if let Err(e) = self.store.add_search(query, documents.clone(), metadata).await {
            warn!(error = %e, "Failed to record search");
        }
        self.record_turn(Role::Assistant, &text, intent_metadata(intent))
            .await;

        let recommendation = (self.config.search.recommendations && !documents.is_empty())
            .then(|| self.recommendation(query));

        debug!(results = documents.len(), "Search answered");
        Reply::Search(SearchReply {
            query: query.to_string(),
            documents,
            text,
            recommendation,
        })
    }

    fn recommendation(&self, query: &str) -> BoxFuture<'static, Option<String>> {
        let model = self.model.clone();
        let policy =
            RetryPolicy::for_kind(&self.config, OperationKind::Conversation).with_max_retries(0);
        let prompt = recommendation_prompt(query);
        async move {
            match run_with_retry(&policy, || model.run(&prompt, &[])).await {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Recommendation unavailable");
                    None
                }
            }
        }
        .boxed()
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    async fn handle_command(&mut self, name: &str, args: &str) -> String {
        let command = Command::parse(name, args);
        debug!(?command, "Running command");
        let budget = self.config.model.timeout();
        match tokio::time::timeout(budget, self.run_command(command)).await {
            Ok(text) => text,
            Err(_) => {
                warn!(command = %name, ?budget, "Command timed out");
                TIMEOUT_APOLOGY.to_string()
            }
        }
    }

    // -----------------------------------------------------------------
    // Conversation
    // -----------------------------------------------------------------

    /// `context` is the window loaded before classification, or the error
    /// that loading it produced.
    pub(crate) async fn handle_conversation(
        &mut self,
        message: &str,
        intent: &IntentResult,
        context: Result<Vec<Message>, ChatError>,
    ) -> String {
        self.record_turn(Role::User, message, intent_metadata(intent))
            .await;

        let policy =
            RetryPolicy::for_kind(&self.config, OperationKind::Conversation).with_max_retries(0);
        let model = self.model.clone();

        let primary: Result<String, ChatError> = match context {
            Ok(context) => {
                let prompt = conversation_prompt(&context, message);
                run_with_retry(&policy, || model.run(&prompt, &[]))
                    .await
                    .map_err(ChatError::from)
            }
            Err(e) => Err(e),
        };

        let outcome = match primary {
            Ok(text) => Ok(text),
            Err(first) => {
                warn!(error = %first, "Context-aware reply failed, falling back to basic reply");
                let prompt = conversation_prompt(&[], message);
                run_with_retry(&policy, || model.run(&prompt, &[]))
                    .await
                    .map_err(|e| (first, ChatError::from(e)))
            }
        };

        match outcome {
            Ok(text) => {
                self.record_turn(Role::Assistant, &text, intent_metadata(intent))
                    .await;
                text
            }
            Err((first, last)) => {
                warn!(error = %last, "Basic reply failed");
                if first.is_timeout() && last.is_timeout() {
                    TIMEOUT_APOLOGY.to_string()
                } else {
                    error_apology(&last)
                }
            }
        }
    }

    /// Recent messages of the session, bounded by the history load budget.
    async fn load_context(&mut self) -> Result<Vec<Message>, ChatError> {
        let budget = self.config.history.load_timeout();
        let n = self.config.history.context_messages;
        match tokio::time::timeout(budget, self.store.recent_messages(n)).await {
            Ok(Ok(messages)) => Ok(messages),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ChatError::Timeout(budget)),
        }
    }

    async fn record_turn(&mut self, role: Role, content: &str, metadata: Metadata) {
        if let Err(e) = self.store.add_message(role, content, metadata).await {
            warn!(%role, error = %e, "Failed to record message");
        }
    }
}

fn intent_metadata(intent: &IntentResult) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("intent".to_string(), serde_json::json!(intent.kind().as_str()));
    metadata.insert("confidence".to_string(), serde_json::json!(intent.confidence));
    metadata
}

impl fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("theme", &self.theme)
            .field("store", &self.store)
            .finish()
    }
}
