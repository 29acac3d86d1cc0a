use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::output::OutputFormat;
use crate::error::ConfigError;
use crate::utils::RetryConfig;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.2:1b";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mapey").join("config.toml"))
    }

    /// Where the CLI keeps its index when none is configured.
    pub fn default_index_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("mapey").join("index.bin"))
    }

    /// The configured index path, falling back to [`Config::default_index_path`].
    pub fn persistent_index_path(&self) -> Option<PathBuf> {
        self.vector_store
            .index_path
            .clone()
            .or_else(Self::default_index_path)
    }

    /// Load the config file (or defaults), then apply `.env` and process
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Apply environment-style overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.embedding.url = url.clone();
            self.generation.url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            self.generation.model = model;
        }
        if let Some(temperature) = get("OLLAMA_TEMPERATURE") {
            self.generation.temperature = parse_var("OLLAMA_TEMPERATURE", &temperature)?;
        }
        if let Some(num_ctx) = get("OLLAMA_NUM_CTX") {
            self.generation.num_ctx = parse_var("OLLAMA_NUM_CTX", &num_ctx)?;
        }
        if let Some(model) = get("EMBED_MODEL_NAME") {
            self.embedding.model = model;
        }
        if let Some(key) = get("TAVILY_API_KEY") {
            self.web_search.api_key = Some(key);
        }
        if let Some(path) = get("VECTOR_STORE_INDEX_PATH") {
            self.vector_store.index_path = Some(PathBuf::from(path));
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.logging.format = format
                .parse()
                .map_err(|e: String| ConfigError::ValidationError(e))?;
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("invalid value for {key}: {value}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_num_ctx() -> u32 {
    4096
}

fn default_generation_timeout() -> u64 {
    240
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_generation_model(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Base path of the persisted index. `None` keeps the store in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Skip chunks whose content is already stored.
    #[serde(default = "default_dedupe")]
    pub dedupe: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_dedupe() -> bool {
    true
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            dedupe: default_dedupe(),
        }
    }
}

impl VectorStoreConfig {
    /// Backoff policy for provider initialization.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.backoff_base_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_tavily_url")]
    pub url: String,

    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_tavily_url() -> String {
    DEFAULT_TAVILY_URL.to_string()
}

fn default_max_results() -> u32 {
    5
}

fn default_search_timeout() -> u64 {
    30
}

impl WebSearchConfig {
    /// The API key, treating a blank value as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: default_tavily_url(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,

    /// Words repeated at the start of each following chunk.
    #[serde(default)]
    pub chunk_overlap_words: usize,

    #[serde(default = "default_min_resume_chars")]
    pub min_resume_chars: usize,

    #[serde(default = "default_max_topic_chars")]
    pub max_topic_chars: usize,
}

fn default_stage_timeout() -> u64 {
    300
}

fn default_retrieval_k() -> usize {
    5
}

fn default_chunk_words() -> usize {
    500
}

fn default_min_resume_chars() -> usize {
    50
}

fn default_max_topic_chars() -> usize {
    200
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            retrieval_k: default_retrieval_k(),
            chunk_words: default_chunk_words(),
            chunk_overlap_words: 0,
            min_resume_chars: default_min_resume_chars(),
            max_topic_chars: default_max_topic_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}
