mod chunker;
mod embedding;
mod generator;
mod index;
mod persistence;
mod vector_store;
mod web_search;

pub use chunker::{TextChunker, estimate_tokens};
pub use embedding::{OllamaEmbedder, TextEmbedder};
pub use generator::{OllamaGenerator, TextGenerator};
pub use index::{FlatL2Index, Neighbor, squared_l2};
pub use persistence::IndexFiles;
pub use vector_store::{ProviderStatus, ScoredChunk, StoreStats, VectorStore};
pub use web_search::{TavilyClient, WebSearch};
