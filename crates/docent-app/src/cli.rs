//! CLI argument definitions for the Docent application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use docent_core::DocentConfig;

/// Docent: a terminal assistant for finding and discussing documents.
#[derive(Parser, Debug, Default)]
#[command(name = "docent", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the history database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Session to open at start-up.
    #[arg(short = 's', long = "session")]
    pub session: Option<String>,

    /// Colour theme (cyberpunk, ocean, forest, sunset).
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Model name sent to the API.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DOCENT_CONFIG env var > ~/.docent/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCENT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply_to(&self, config: &mut DocentConfig) {
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref session) = self.session {
            config.general.session = session.clone();
        }
        if let Some(ref theme) = self.theme {
            config.ui.theme = theme.clone();
        }
        if let Some(ref model) = self.model {
            config.model.model = model.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docent").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docent").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand ~ to the home directory in a path string.
pub fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let args = CliArgs::try_parse_from([
            "docent",
            "--config",
            "/tmp/docent.toml",
            "-d",
            "/tmp/data",
            "--log-level",
            "debug",
            "--session",
            "research",
            "--theme",
            "ocean",
            "--model",
            "gpt-4o",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/docent.toml"));
        assert_eq!(args.session.as_deref(), Some("research"));
    }

    #[test]
    fn test_apply_to_overrides_only_given_flags() {
        let args = CliArgs {
            theme: Some("sunset".to_string()),
            model: Some("local-model".to_string()),
            ..CliArgs::default()
        };
        let mut config = DocentConfig::default();
        config.general.session = "work".to_string();
        args.apply_to(&mut config);

        assert_eq!(config.ui.theme, "sunset");
        assert_eq!(config.model.model, "local-model");
        assert_eq!(config.general.session, "work");
        assert_eq!(config.general.log_level, "warn");
    }

    #[test]
    fn test_resolve_data_dir_absolute() {
        assert_eq!(resolve_data_dir("/var/lib/docent"), PathBuf::from("/var/lib/docent"));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_resolve_data_dir_expands_home() {
        let resolved = resolve_data_dir("~/.docent/data");
        assert!(resolved.ends_with(".docent/data"));
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }
}
