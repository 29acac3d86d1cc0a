use std::fmt::{self, Write as FmtWrite};
use std::path::PathBuf;

use serde::Serialize;

use crate::models::{OutputFormat, RoadmapResponse, SearchResults};
use crate::pipeline::StageOutcome;
use crate::services::{ProviderStatus, StoreStats};
use crate::utils::preview;

pub trait Formatter {
    fn format_roadmap(&self, response: &RoadmapResponse) -> String;
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_index_stats(&self, stats: &IndexStats) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_provider: String,
    pub provider_status: ProviderStatus,
    pub generation_model: String,
    pub web_search_configured: bool,
    pub index_path: Option<PathBuf>,
    pub store: StoreStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub files_scanned: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub chunks_created: u64,
    pub chunks_added: u64,
    pub duration_ms: u64,
}

const SEARCH_PREVIEW_CHARS: usize = 200;

fn outcome_label(outcome: &StageOutcome) -> &'static str {
    match outcome {
        StageOutcome::Completed => "ok",
        StageOutcome::Failed { .. } => "failed",
    }
}

fn provider_label(status: ProviderStatus) -> &'static str {
    match status {
        ProviderStatus::Ready => "READY",
        ProviderStatus::Degraded => "DEGRADED",
    }
}

pub struct TextFormatter;

impl TextFormatter {
    fn roadmap(response: &RoadmapResponse) -> Result<String, fmt::Error> {
        let mut output = String::new();
        let sections = [
            ("Skill Gaps", &response.skill_gaps),
            ("Curriculum", &response.curriculum),
            ("Resources", &response.resources),
            ("Roadmap", &response.roadmap),
        ];

        for (title, body) in sections {
            writeln!(output, "{title}")?;
            writeln!(output, "{}", "-".repeat(title.len()))?;
            writeln!(output, "{}\n", body.trim())?;
        }

        writeln!(
            output,
            "Run {} for \"{}\" finished in {}ms",
            response.run_id, response.topic, response.processing_time_ms
        )?;
        for report in &response.stages {
            writeln!(
                output,
                "  {:<20} {:<7} {}ms",
                report.name,
                outcome_label(&report.outcome),
                report.duration_ms
            )?;
        }
        Ok(output)
    }

    fn search(results: &SearchResults) -> Result<String, fmt::Error> {
        if results.is_empty() {
            return Ok(format!("No results found for: {}\n", results.query));
        }

        let mut output = String::new();
        writeln!(output, "Search results for: \"{}\"", results.query)?;
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )?;

        for (i, hit) in results.results.iter().enumerate() {
            writeln!(output, "{}. [Distance: {:.3}]", i + 1, hit.distance)?;
            for line in preview(&hit.text, SEARCH_PREVIEW_CHARS).lines() {
                writeln!(output, "   {line}")?;
            }
            writeln!(output)?;
        }
        Ok(output)
    }

    fn status(status: &StatusInfo) -> Result<String, fmt::Error> {
        let mut output = String::new();
        writeln!(output, "Status")?;
        writeln!(output, "------")?;
        writeln!(
            output,
            "Embedding:     {} [{}]",
            status.embedding_provider,
            provider_label(status.provider_status)
        )?;
        writeln!(output, "Generation:    {}", status.generation_model)?;
        writeln!(
            output,
            "Web Search:    {}",
            if status.web_search_configured {
                "[CONFIGURED]"
            } else {
                "[DISABLED]"
            }
        )?;
        writeln!(output)?;
        writeln!(output, "Vector Store")?;
        match &status.index_path {
            Some(path) => writeln!(output, "  Path:        {}", path.display())?,
            None => writeln!(output, "  Path:        (in memory)")?,
        }
        writeln!(output, "  Chunks:      {}", status.store.chunk_count)?;
        if let Some(dimension) = status.store.dimension {
            writeln!(output, "  Dimension:   {dimension}")?;
        }
        Ok(output)
    }

    fn index_stats(stats: &IndexStats) -> Result<String, fmt::Error> {
        let mut output = String::new();
        writeln!(output, "Indexing Complete")?;
        writeln!(output, "-----------------")?;
        writeln!(output, "Files scanned:  {}", stats.files_scanned)?;
        writeln!(output, "Files indexed:  {}", stats.files_indexed)?;
        writeln!(output, "Files skipped:  {}", stats.files_skipped)?;
        writeln!(output, "Chunks created: {}", stats.chunks_created)?;
        writeln!(output, "Chunks added:   {}", stats.chunks_added)?;
        writeln!(output, "Duration:       {}ms", stats.duration_ms)?;
        Ok(output)
    }
}

impl Formatter for TextFormatter {
    fn format_roadmap(&self, response: &RoadmapResponse) -> String {
        Self::roadmap(response).unwrap_or_default()
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        Self::search(results).unwrap_or_default()
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        Self::status(status).unwrap_or_default()
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        Self::index_stats(stats).unwrap_or_default()
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_roadmap(&self, response: &RoadmapResponse) -> String {
        self.render(response)
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        self.render(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        self.render(stats)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn roadmap(response: &RoadmapResponse) -> Result<String, fmt::Error> {
        let mut output = String::new();
        writeln!(output, "# Career Roadmap: {}\n", response.topic)?;

        let sections = [
            ("Role Analysis", &response.analysis),
            ("Skill Gaps", &response.skill_gaps),
            ("Curriculum", &response.curriculum),
            ("Resources", &response.resources),
            ("Roadmap", &response.roadmap),
        ];
        for (title, body) in sections {
            writeln!(output, "## {title}\n")?;
            writeln!(output, "{}\n", body.trim())?;
        }

        writeln!(output, "## Run\n")?;
        writeln!(output, "| Stage | Outcome | Duration |")?;
        writeln!(output, "|-------|---------|----------|")?;
        for report in &response.stages {
            writeln!(
                output,
                "| `{}` | {} | {}ms |",
                report.name,
                outcome_label(&report.outcome),
                report.duration_ms
            )?;
        }
        writeln!(
            output,
            "\n*Run `{}` finished in {}ms.*",
            response.run_id, response.processing_time_ms
        )?;
        Ok(output)
    }

    fn search(results: &SearchResults) -> Result<String, fmt::Error> {
        if results.is_empty() {
            return Ok(format!("## No results found\n\nQuery: `{}`\n", results.query));
        }

        let mut output = String::new();
        writeln!(output, "## Search Results\n")?;
        writeln!(output, "**Query:** `{}`\n", results.query)?;
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )?;

        for (i, hit) in results.results.iter().enumerate() {
            writeln!(output, "### {}. Distance: {:.3}\n", i + 1, hit.distance)?;
            writeln!(output, "```")?;
            writeln!(output, "{}", hit.text)?;
            writeln!(output, "```\n")?;
        }
        Ok(output)
    }

    fn status(status: &StatusInfo) -> Result<String, fmt::Error> {
        let mut output = String::new();
        writeln!(output, "## Status\n")?;

        let ready = match status.provider_status {
            ProviderStatus::Ready => "✅",
            ProviderStatus::Degraded => "❌",
        };
        writeln!(output, "- **Embedding:** {} {}", status.embedding_provider, ready)?;
        writeln!(output, "- **Generation:** {}", status.generation_model)?;
        writeln!(
            output,
            "- **Web Search:** {}",
            if status.web_search_configured { "✅" } else { "❌" }
        )?;
        writeln!(output)?;

        writeln!(output, "### Vector Store\n")?;
        match &status.index_path {
            Some(path) => writeln!(output, "- **Path:** `{}`", path.display())?,
            None => writeln!(output, "- **Path:** *(in memory)*")?,
        }
        writeln!(output, "- **Chunks:** {}", status.store.chunk_count)?;
        if let Some(dimension) = status.store.dimension {
            writeln!(output, "- **Dimension:** {dimension}")?;
        }
        Ok(output)
    }

    fn index_stats(stats: &IndexStats) -> Result<String, fmt::Error> {
        let mut output = String::new();
        writeln!(output, "## Indexing Complete\n")?;
        writeln!(output, "| Metric | Value |")?;
        writeln!(output, "|--------|-------|")?;
        writeln!(output, "| Files scanned | {} |", stats.files_scanned)?;
        writeln!(output, "| Files indexed | {} |", stats.files_indexed)?;
        writeln!(output, "| Files skipped | {} |", stats.files_skipped)?;
        writeln!(output, "| Chunks created | {} |", stats.chunks_created)?;
        writeln!(output, "| Chunks added | {} |", stats.chunks_added)?;
        writeln!(output, "| Duration | {}ms |", stats.duration_ms)?;
        Ok(output)
    }
}

impl Formatter for MarkdownFormatter {
    fn format_roadmap(&self, response: &RoadmapResponse) -> String {
        Self::roadmap(response).unwrap_or_default()
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        Self::search(results).unwrap_or_default()
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        Self::status(status).unwrap_or_default()
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        Self::index_stats(stats).unwrap_or_default()
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
