mod config;
mod output;
mod roadmap;

pub use config::{
    Config, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_OLLAMA_URL,
    DEFAULT_TAVILY_URL, EmbeddingConfig, GenerationConfig, LogFormat, LoggingConfig, OutputConfig,
    PipelineConfig, VectorStoreConfig, WebSearchConfig,
};
pub use output::{OutputFormat, SearchResults};
pub use roadmap::{RoadmapRequest, RoadmapResponse};
