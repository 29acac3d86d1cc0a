//! Error types for the roadmap generator.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::Field;
use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // 5xx and rate limiting can clear up on their own
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to text generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to connect to generation server: {0}")]
    ConnectionError(String),

    #[error("generation server error: {0}")]
    ServerError(String),

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation timeout")]
    Timeout,
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::ConnectionError(_) | GenerationError::Timeout => true,
            GenerationError::ServerError(msg) => is_transient_status(msg),
            GenerationError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GenerationError::InvalidResponse(_) => false,
        }
    }
}

fn is_transient_status(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    msg.contains("503")
        || msg.contains("502")
        || msg.contains("504")
        || msg.contains("429")
        || lower.contains("unavailable")
        || lower.contains("too many requests")
}

/// Errors related to web search lookups.
#[derive(Debug, Error)]
pub enum WebSearchError {
    #[error("web search request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("web search server error: {0}")]
    ServerError(String),

    #[error("invalid web search response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by the in-memory similarity index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index dimension must be greater than zero")]
    ZeroDimension,
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<IndexError> for VectorStoreError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                VectorStoreError::DimensionMismatch { expected, actual }
            }
            IndexError::ZeroDimension => VectorStoreError::Embedding(
                EmbeddingError::InvalidResponse("empty embedding vector".to_string()),
            ),
        }
    }
}

/// Errors raised while saving or loading the persisted index.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("index encoding error: {0}")]
    IndexEncoding(#[from] bincode::Error),

    #[error("chunk log encoding error: {0}")]
    ChunkLogEncoding(#[from] serde_json::Error),

    #[error("persisted index is incomplete: {0}")]
    Incomplete(String),

    #[error("persisted index holds {vectors} vectors but {texts} texts")]
    CountMismatch { vectors: usize, texts: usize },
}

/// Errors raised inside a single pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("{0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("{0}")]
    WebSearch(#[from] WebSearchError),

    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("stage panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// Errors that invalidate a whole pipeline run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("stage '{stage}' reads '{field}' but no earlier stage produces it")]
    MissingProducer { stage: String, field: Field },

    #[error("stage '{stage}' writes input field '{field}'")]
    WritesInput { stage: String, field: Field },

    #[error("field '{field}' is written by both '{first}' and '{second}'")]
    MultipleWriters {
        field: Field,
        first: String,
        second: String,
    },

    #[error("stage dependencies form a cycle: {0:?}")]
    Cycle(Vec<String>),

    #[error("invalid initial state: {0}")]
    InvalidState(String),
}

/// Errors in a roadmap request, rejected before the pipeline starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("topic is too long: {len} characters (max {max})")]
    TopicTooLong { len: usize, max: usize },

    #[error(
        "resume appears to be empty or unreadable: {len} non-whitespace characters (min {min})"
    )]
    ResumeTooShort { len: usize, min: usize },
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("web search error: {0}")]
    WebSearch(#[from] WebSearchError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("request error: {0}")]
    Request(#[from] RequestError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::ConnectionError("refused".into()).is_retryable());
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ServerError("status 503: busy".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 404: model not found".into()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_index_error_maps_to_dimension_mismatch() {
        let err: VectorStoreError = IndexError::DimensionMismatch {
            expected: 3,
            actual: 4,
        }
        .into();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_stage_timeout_message() {
        let err = StageError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "stage timed out after 30s");
        let err = StageError::Timeout(Duration::from_millis(20));
        assert_eq!(err.to_string(), "stage timed out after 20ms");
    }
}
