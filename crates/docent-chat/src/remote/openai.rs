//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use docent_core::config::ModelConfig;
use docent_core::types::{Message, Role};

use super::ModelClient;
use crate::error::ChatError;

const SYSTEM_PROMPT: &str = "You are Docent, a helpful assistant for finding, \
    explaining and recommending documents. Answer conversationally and concisely.";

/// Model client talking to any OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: completions_url(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(&self, prompt: &str, history: &[Message]) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.to_string(),
        });
        messages.extend(history.iter().map(|m| WireMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            }
            .to_string(),
            content: m.content.clone(),
        }));
        messages.push(WireMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });
        messages
    }
}

#[async_trait]
impl ModelClient for OpenAiModel {
    async fn run(&self, prompt: &str, history: &[Message]) -> Result<String, ChatError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: self.build_messages(prompt, history),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, text, self.timeout));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let answer = extract_text(parsed)?;
        debug!(model = %self.model, chars = answer.len(), "Model answered");
        Ok(answer)
    }
}

impl OpenAiModel {
    fn map_transport_error(&self, err: reqwest::Error) -> ChatError {
        if err.is_timeout() {
            ChatError::Timeout(self.timeout)
        } else {
            ChatError::Model(format!("Model request failed: {}", err))
        }
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn map_http_error(status: StatusCode, body: String, timeout: Duration) -> ChatError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(body),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ChatError::Timeout(timeout),
        _ => ChatError::Model(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}

fn extract_text(response: CompletionResponse) -> Result<String, ChatError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ChatError::Model("Response contained no message content".to_string()))
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::types::Session;

    fn model() -> OpenAiModel {
        OpenAiModel::new(&ModelConfig {
            api_key: "sk-test".to_string(),
            base_url: "https://example.test/v1/".to_string(),
            model: "test-model".to_string(),
            timeout_secs: 7,
        })
        .unwrap()
    }

    #[test]
    fn test_completions_url_trims_slash() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(model().endpoint, "https://example.test/v1/chat/completions");
        assert_eq!(model().model(), "test-model");
    }

    #[test]
    fn test_build_messages_order() {
        let sid = Session::new("default").id;
        let history = vec![
            Message::new(sid, Role::User, "hi"),
            Message::new(sid, Role::Assistant, "hello"),
        ];
        let messages = model().build_messages("what next?", &history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "what next?");
    }

    #[test]
    fn test_map_http_error() {
        let t = Duration::from_secs(7);
        assert!(matches!(
            map_http_error(StatusCode::UNAUTHORIZED, "bad key".to_string(), t),
            ChatError::Auth(_)
        ));
        assert!(matches!(
            map_http_error(StatusCode::FORBIDDEN, String::new(), t),
            ChatError::Auth(_)
        ));
        assert!(map_http_error(StatusCode::GATEWAY_TIMEOUT, String::new(), t).is_timeout());
        let err = map_http_error(StatusCode::INTERNAL_SERVER_ERROR, "oops".to_string(), t);
        assert_eq!(err.to_string(), "model error: HTTP 500: oops");
    }

    #[test]
    fn test_extract_text() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "  Hello!  "}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Hello!");
    }

    #[test]
    fn test_extract_text_empty_choices() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(ChatError::Model(_))));
    }
}
