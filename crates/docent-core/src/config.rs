use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocentError, Result};
use crate::theme::Theme;

/// Top-level configuration for Docent.
///
/// Loaded from `~/.docent/config.toml` by default. Built once at start-up and
/// handed to the pipeline, the history store and the retry policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocentConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl DocentConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocentConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL` from the
    /// process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay model settings from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.model.api_key = key;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.model.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|v| !v.is_empty()) {
            self.model.model = model;
        }
    }

    /// Check that the configuration is usable for talking to the model.
    pub fn validate(&self) -> Result<()> {
        if self.model.api_key.trim().is_empty() {
            return Err(DocentError::Config(
                "model.api_key is not set (use OPENAI_API_KEY or the config file)".to_string(),
            ));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(DocentError::Config("model.base_url is empty".to_string()));
        }
        if self.model.timeout_secs == 0 || self.search.timeout_secs == 0 {
            return Err(DocentError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        let longest_attempt = self.model.timeout_secs.max(self.search.timeout_secs);
        if self.retry.max_total_secs < longest_attempt {
            return Err(DocentError::Config(format!(
                "retry.max_total_secs ({}) must be at least the longest per-attempt timeout ({})",
                self.retry.max_total_secs, longest_attempt
            )));
        }
        if self.ui.theme.parse::<Theme>().is_err() {
            return Err(DocentError::Config(format!(
                "unknown theme '{}'",
                self.ui.theme
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the history database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Session opened at start-up.
    pub session: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.docent/data".to_string(),
            log_level: "warn".to_string(),
            session: "default".to_string(),
        }
    }
}

/// Remote language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Per-attempt budget for conversational calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Remote document search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// HTTP search endpoint. When unset, searches are answered by the model.
    pub endpoint: Option<String>,
    /// Per-attempt budget for lookup calls, in seconds.
    pub timeout_secs: u64,
    /// Number of results listed in a search reply.
    pub max_results_shown: usize,
    /// Maximum length of a document preview, in characters.
    pub preview_chars: usize,
    /// Ask the model for a follow-up recommendation after each search.
    pub recommendations: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 20,
            max_results_shown: 3,
            preview_chars: 200,
            recommendations: true,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry policy shared by all remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,
    /// Budget for all attempts together, in seconds.
    pub max_total_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_total_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_total(&self) -> Duration {
        Duration::from_secs(self.max_total_secs)
    }
}

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Prior messages included in a conversational prompt.
    pub context_messages: usize,
    /// Budget for loading prior messages, in milliseconds.
    pub load_timeout_ms: u64,
    /// Searches listed by `/history`.
    pub recent_searches: usize,
    /// Queries listed as popular by `/analytics`.
    pub popular_queries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            context_messages: 5,
            load_timeout_ms: 5000,
            recent_searches: 5,
            popular_queries: 5,
        }
    }
}

impl HistoryConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

/// Terminal UI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Theme name: cyberpunk, ocean, forest or sunset.
    pub theme: String,
    /// Delay between revealed characters of a reply, in milliseconds. 0 disables.
    pub typing_delay_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default().name().to_string(),
            typing_delay_ms: 4,
        }
    }
}
