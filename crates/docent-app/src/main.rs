//! Docent application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite history database
//! 3. Build the model client and the document search backend
//! 4. Run the interactive REPL until the user exits

mod cli;
mod repl;
mod theme;

use std::sync::Arc;

use clap::Parser;

use docent_chat::{
    ChatPipeline, DocumentSearch, HttpDocumentSearch, ModelClient, ModelDocumentSearch,
    OpenAiModel,
};
use docent_core::DocentConfig;
use docent_storage::{Database, HistoryStore};

use cli::{resolve_data_dir, CliArgs};
use repl::Repl;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config: CLI > env > file > defaults.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = DocentConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    args.apply_to(&mut config);

    // Tracing. Logs go to stderr so they never interleave with replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Docent v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), exists = config_exists, "Configuration resolved");

    if !config_exists {
        match DocentConfig::default().save(&config_file) {
            Ok(()) => tracing::info!(path = %config_file.display(), "Default configuration written"),
            Err(e) => tracing::warn!(error = %e, "Could not write default configuration"),
        }
    }

    config.validate()?;

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("docent.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Remote clients.
    let config = Arc::new(config);
    let model: Arc<dyn ModelClient> = Arc::new(OpenAiModel::new(&config.model)?);
    tracing::info!(model = %config.model.model, "Model client ready");

    let search: Arc<dyn DocumentSearch> = match config.search.endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!(endpoint, "Using HTTP document search");
            Arc::new(HttpDocumentSearch::new(endpoint, &config.search)?)
        }
        None => {
            tracing::info!("No search endpoint configured, answering searches with the model");
            Arc::new(ModelDocumentSearch::new(Arc::clone(&model), &config.search))
        }
    };

    let store = HistoryStore::new(db, &config.general.session);
    let pipeline = ChatPipeline::new(Arc::clone(&config), model, search, store);

    Repl::new(pipeline)?.run().await?;

    tracing::info!("Docent stopped");
    Ok(())
}
