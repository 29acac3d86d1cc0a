//! Generate command implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::load_cli_config;
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, RoadmapRequest};
use crate::pipeline::{PipelineObserver, StageReport};
use crate::roadmap::RoadmapService;
use crate::utils::{DEFAULT_MAX_FILE_SIZE, is_text_file, read_file_content};

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Target role, e.g. "Machine Learning Engineer"
    #[arg(long, short = 't')]
    pub topic: String,

    /// Plain-text resume file
    #[arg(long, short = 'r')]
    pub resume: PathBuf,

    /// Job description text
    #[arg(long, conflicts_with = "jd_file")]
    pub jd: Option<String>,

    /// File containing the job description
    #[arg(long)]
    pub jd_file: Option<PathBuf>,
}

/// Shows the running stage on a spinner.
struct SpinnerObserver {
    spinner: ProgressBar,
    verbose: bool,
}

impl SpinnerObserver {
    fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}")
        {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self { spinner, verbose }
    }
}

impl PipelineObserver for SpinnerObserver {
    fn stage_started(&self, index: usize, total: usize, name: &str) {
        self.spinner
            .set_message(format!("[{}/{}] {}", index + 1, total, name));
    }

    fn stage_finished(&self, report: &StageReport) {
        if report.outcome.is_failed() {
            self.spinner
                .println(format!("✗ {} failed after {}ms", report.name, report.duration_ms));
        } else if self.verbose {
            self.spinner
                .println(format!("✓ {} ({}ms)", report.name, report.duration_ms));
        }
    }
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    if !path.is_file() {
        anyhow::bail!("{what} file not found: {}", path.display());
    }
    if !is_text_file(path) {
        anyhow::bail!("{what} must be a plain-text file, got: {}", path.display());
    }
    read_file_content(path, DEFAULT_MAX_FILE_SIZE)
        .with_context(|| format!("failed to read {what} file {}", path.display()))
}

pub async fn handle_generate(args: GenerateArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = load_cli_config()?;
    let formatter = get_formatter(format);

    let resume = read_text(&args.resume, "resume")?;
    let jd = match (args.jd, args.jd_file) {
        (Some(text), _) => Some(text),
        (None, Some(path)) => Some(read_text(&path, "job description")?),
        (None, None) => None,
    };

    let mut request = RoadmapRequest::new(args.topic, resume);
    if let Some(jd) = jd {
        request = request.with_jd(jd);
    }
    request
        .validate(&config.pipeline)
        .context("invalid roadmap request")?;

    if verbose {
        eprintln!("Topic: {}", request.topic.trim());
        eprintln!("  Generation model: {}", config.generation.model);
        eprintln!("  Embedding model: {}", config.embedding.model);
    }

    let service = RoadmapService::from_config(&config)
        .await
        .context("failed to set up roadmap service")?;

    let observer = SpinnerObserver::new(verbose);
    let result = service.generate_with_observer(&request, &observer).await;
    observer.spinner.finish_and_clear();

    let response = result.context("roadmap generation failed")?;
    print!("{}", formatter.format_roadmap(&response));

    Ok(())
}
