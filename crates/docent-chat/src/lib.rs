//! Conversational core of Docent.
//!
//! Intent classification, the retry/timeout controller, the response
//! pipeline with its slash commands, and the remote model and search clients.

pub mod classifier;
pub mod commands;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod response;
pub mod retry;

pub use classifier::{classify, extract_keywords, similarity, Intent, IntentKind, IntentResult};
pub use commands::{help_text, Command};
pub use error::ChatError;
pub use pipeline::{ChatPipeline, Reply, SearchReply};
pub use remote::{
    DocumentSearch, HttpDocumentSearch, ModelClient, ModelDocumentSearch, OpenAiModel,
    SearchFilters,
};
pub use retry::{run_with_retry, OperationKind, RetryError, RetryPolicy, Retryable};
