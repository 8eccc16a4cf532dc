//! Document search backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use docent_core::config::SearchConfig;
use docent_core::types::{Metadata, SearchResult};

use super::{DocumentSearch, ModelClient, SearchFilters};
use crate::error::ChatError;

// =============================================================================
// HttpDocumentSearch
// =============================================================================

/// Search service reached over HTTP.
///
/// POSTs `{"query", "filters"}` to the endpoint and accepts either a JSON
/// array of documents or an object with a `results` array.
#[derive(Clone)]
pub struct HttpDocumentSearch {
    client: Client,
    endpoint: String,
    preview_chars: usize,
    timeout: Duration,
}

impl HttpDocumentSearch {
    pub fn new(endpoint: &str, config: &SearchConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            preview_chars: config.preview_chars,
            timeout: config.timeout(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    filters: &'a SearchFilters,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<SearchResult>),
    Wrapped { results: Vec<SearchResult> },
}

impl SearchResponse {
    fn into_results(self) -> Vec<SearchResult> {
        match self {
            SearchResponse::List(results) | SearchResponse::Wrapped { results } => results,
        }
    }
}

#[async_trait]
impl DocumentSearch for HttpDocumentSearch {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>, ChatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest { query, filters })
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(body),
                StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                    ChatError::Timeout(self.timeout)
                }
                _ => ChatError::Search(format!("HTTP {}: {}", status.as_u16(), body)),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let results = bound_previews(parsed.into_results(), self.preview_chars);
        debug!(query, results = results.len(), "Search backend answered");
        Ok(results)
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout(timeout)
    } else {
        ChatError::Search(format!("Search request failed: {}", err))
    }
}

fn bound_previews(mut results: Vec<SearchResult>, preview_chars: usize) -> Vec<SearchResult> {
    for result in &mut results {
        result.truncate_preview(preview_chars);
    }
    results
}

// =============================================================================
// ModelDocumentSearch
// =============================================================================

/// Search answered by the language model itself.
///
/// Used when no search endpoint is configured. The answer is wrapped as a
/// single document whose preview is the start of the answer.
#[derive(Clone)]
pub struct ModelDocumentSearch {
    model: Arc<dyn ModelClient>,
    preview_chars: usize,
}

impl ModelDocumentSearch {
    pub fn new(model: Arc<dyn ModelClient>, config: &SearchConfig) -> Self {
        Self {
            model,
            preview_chars: config.preview_chars,
        }
    }
}

#[async_trait]
impl DocumentSearch for ModelDocumentSearch {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>, ChatError> {
        let mut prompt = format!("Search for documents related to: {}", query);
        if !filters.is_empty() {
            let filters = serde_json::to_string(filters)
                .map_err(|e| ChatError::Search(format!("Invalid filters: {}", e)))?;
            prompt.push_str(&format!(" with filters: {}", filters));
        }

        let answer = self.model.run(&prompt, &[]).await?;
        if answer.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut result = SearchResult {
            id: "1".to_string(),
            title: format!("Results for \"{}\"", query.trim()),
            file_path: String::new(),
            content_preview: answer.clone(),
            relevance_score: 1.0,
            file_type: "text".to_string(),
            size: answer.len() as u64,
            metadata: Metadata::new(),
        };
        result.truncate_preview(self.preview_chars);
        Ok(vec![result])
    }
}
