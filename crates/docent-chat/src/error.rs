//! Error types for the chat pipeline and its remote collaborators.

use docent_core::error::DocentError;

/// Errors from the model, the document search and the history store.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Whether the failure was the call running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChatError::Timeout(_))
    }
}

impl From<DocentError> for ChatError {
    fn from(err: DocentError) -> Self {
        match err {
            DocentError::Config(msg) => ChatError::Config(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "request timed out after 30s");

        let err = ChatError::Auth("invalid api key".to_string());
        assert_eq!(err.to_string(), "authentication failed: invalid api key");

        let err = ChatError::Model("rate limited".to_string());
        assert_eq!(err.to_string(), "model error: rate limited");

        let err = ChatError::Search("index unavailable".to_string());
        assert_eq!(err.to_string(), "search error: index unavailable");

        let err = ChatError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn test_is_timeout() {
        assert!(ChatError::Timeout(Duration::from_millis(1)).is_timeout());
        assert!(!ChatError::Model("x".to_string()).is_timeout());
        assert!(!ChatError::Auth("x".to_string()).is_timeout());
    }

    #[test]
    fn test_from_docent_error_storage() {
        let err: ChatError = DocentError::Storage("connection lost".to_string()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_from_docent_error_config() {
        let err: ChatError = DocentError::Config("missing key".to_string()).into();
        assert!(matches!(err, ChatError::Config(ref m) if m == "missing key"));
    }
}
