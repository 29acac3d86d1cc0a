mod config;
mod generate;
mod index;
mod search;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{OllamaEmbedder, VectorStore};

pub use config::ConfigCommand;
pub use generate::GenerateArgs;
pub use index::IndexCommand;
pub use search::SearchArgs;

pub use config::handle_config;
pub use generate::handle_generate;
pub use index::handle_index;
pub use search::handle_search;
pub use status::handle_status;

/// Load the config for a CLI run. The CLI always persists its index, so an
/// unset index path falls back to the per-user data directory.
pub(crate) fn load_cli_config() -> Result<Config> {
    let mut config = Config::load()?;
    config.vector_store.index_path = config.persistent_index_path();
    Ok(config)
}

pub(crate) async fn open_store(config: &Config) -> Result<Arc<VectorStore>> {
    let embedder = OllamaEmbedder::new(&config.embedding).context("invalid embedding config")?;
    Ok(Arc::new(
        VectorStore::open(Arc::new(embedder), &config.vector_store).await,
    ))
}
