//! SQLite-backed conversation history for Docent.

pub mod db;
pub mod history;
pub mod migrations;
pub mod repository;

pub use db::{Database, Location};
pub use history::{HistoryStore, SessionSwitch};
pub use repository::{HistoryBatch, HistoryRepository, HistorySnapshot};
