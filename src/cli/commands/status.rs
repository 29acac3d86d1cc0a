use anyhow::Result;

use super::{load_cli_config, open_store};
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::OutputFormat;
use crate::services::ProviderStatus;

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = load_cli_config()?;
    let formatter = get_formatter(format);

    let store = open_store(&config).await?;
    let provider_status = store.provider_status().await;

    let status = StatusInfo {
        embedding_provider: store.provider_description(),
        provider_status,
        generation_model: config.generation.model.clone(),
        web_search_configured: config.web_search.is_configured(),
        index_path: store.index_path().map(ToOwned::to_owned),
        store: store.stats().await,
    };

    print!("{}", formatter.format_status(&status));

    if provider_status == ProviderStatus::Degraded || !status.web_search_configured {
        eprintln!();
        if provider_status == ProviderStatus::Degraded {
            eprintln!(
                "Warning: embedding server unreachable at {}. Start it with: ollama serve",
                config.embedding.url
            );
            eprintln!(
                "         Then pull the model with: ollama pull {}",
                config.embedding.model
            );
        }
        if !status.web_search_configured {
            eprintln!("Hint: set TAVILY_API_KEY to enable resource curation from web search.");
        }
    }

    Ok(())
}
