//! Remote collaborators: the language model and the document search.
//!
//! Both are opaque async RPCs behind traits so the pipeline can be driven by
//! scripted implementations in tests.

mod openai;
mod search;

use async_trait::async_trait;
use serde::Serialize;

use docent_core::types::{Message, SearchResult};

use crate::error::ChatError;

pub use openai::OpenAiModel;
pub use search::{HttpDocumentSearch, ModelDocumentSearch};

/// A language model answering a prompt, optionally with prior turns.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run `prompt` after `history` (oldest first) and return the answer text.
    async fn run(&self, prompt: &str, history: &[Message]) -> Result<String, ChatError>;
}

/// Optional constraints passed through to the search backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.file_type.is_none() && self.limit.is_none()
    }
}

/// A backend returning ranked documents for a query.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>, ChatError>;
}
