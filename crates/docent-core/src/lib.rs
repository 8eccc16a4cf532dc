pub mod config;
pub mod error;
pub mod theme;
pub mod types;

pub use config::DocentConfig;
pub use error::{DocentError, Result};
pub use theme::Theme;
pub use types::*;
