//! Index command implementation.

use anyhow::{Context, Result};
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use super::{load_cli_config, open_store};
use crate::cli::output::{IndexStats, get_formatter};
use crate::models::OutputFormat;
use crate::services::TextChunker;
use crate::utils::{DEFAULT_MAX_FILE_SIZE, is_text_file, read_file_content};

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Add text files or directories to the knowledge base
    Add {
        /// Path to directory or file to index
        #[arg(required = true)]
        path: PathBuf,

        /// File patterns to exclude (can be specified multiple times)
        #[arg(long, short = 'e')]
        exclude: Vec<String>,

        /// Show what would be indexed without actually indexing
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear all indexed chunks
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },
}

pub async fn handle_index(cmd: IndexCommand, format: OutputFormat, verbose: bool) -> Result<()> {
    match cmd {
        IndexCommand::Add {
            path,
            exclude,
            dry_run,
        } => handle_add(path, exclude, dry_run, format, verbose).await,
        IndexCommand::Clear { force } => handle_clear(force, format, verbose).await,
    }
}

async fn handle_add(
    path: PathBuf,
    exclude: Vec<String>,
    dry_run: bool,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = load_cli_config()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let path = path.canonicalize().context("invalid path")?;
    let files = collect_files(&path, &exclude)?;

    if files.is_empty() {
        println!("{}", formatter.format_message("No files found to index."));
        return Ok(());
    }

    if verbose {
        eprintln!("Found {} files to process", files.len());
    }

    if dry_run {
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: Would index {} files", files.len()))
        );
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let store = open_store(&config).await?;
    let chunker = TextChunker::from_config(&config.pipeline);

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut stats = IndexStats {
        files_scanned: files.len() as u64,
        ..Default::default()
    };

    for file_path in &files {
        pb.inc(1);

        if !is_text_file(file_path) {
            stats.files_skipped += 1;
            continue;
        }

        let content = match read_file_content(file_path, DEFAULT_MAX_FILE_SIZE) {
            Ok(c) => c,
            Err(e) => {
                if verbose {
                    pb.println(format!("Skipping {}: {}", file_path.display(), e));
                }
                stats.files_skipped += 1;
                continue;
            }
        };

        let chunks = chunker.chunk(&content);
        if chunks.is_empty() {
            stats.files_skipped += 1;
            continue;
        }

        let added = store
            .add_texts(&chunks)
            .await
            .with_context(|| format!("failed to index {}", file_path.display()))?;

        stats.files_indexed += 1;
        stats.chunks_created += chunks.len() as u64;
        stats.chunks_added += added as u64;
    }

    pb.finish_and_clear();
    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_index_stats(&stats));

    Ok(())
}

async fn handle_clear(force: bool, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = load_cli_config()?;
    let formatter = get_formatter(format);

    if verbose {
        eprintln!("Clearing the knowledge base...");
    }

    if !force {
        println!("This will delete ALL indexed chunks. Continue? [y/N]");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let store = open_store(&config).await?;
    store.clear().await;

    println!(
        "{}",
        formatter.format_message("All indexed chunks have been cleared.")
    );

    Ok(())
}

fn collect_files(path: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let patterns = exclude
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid exclude pattern: {p}")))
        .collect::<Result<Vec<_>>>()?;

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.context("failed to read directory entry")?;
        let entry_path = entry.path();

        if !entry_path.is_file() {
            continue;
        }

        let path_str = entry_path.to_string_lossy();
        if patterns.iter().any(|p| p.matches(&path_str)) {
            continue;
        }

        files.push(entry_path.to_path_buf());
    }

    files.sort();
    Ok(files)
}
