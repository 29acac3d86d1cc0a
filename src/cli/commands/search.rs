use anyhow::Result;
use clap::Args;
use std::time::Instant;

use super::{load_cli_config, open_store};
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, SearchResults};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'n', help = "Maximum number of chunks to return")]
    pub limit: Option<usize>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = load_cli_config()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let limit = args.limit.unwrap_or(config.pipeline.retrieval_k);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Limit: {limit}");
    }

    let store = open_store(&config).await?;
    let results = store.search_scored(query, limit).await;

    let duration_ms = start_time.elapsed().as_millis() as u64;
    if verbose {
        eprintln!("  Search: {duration_ms}ms");
        eprintln!();
    }

    let search_results = SearchResults::new(query.to_string(), limit, results, duration_ms);
    print!("{}", formatter.format_search_results(&search_results));

    Ok(())
}
