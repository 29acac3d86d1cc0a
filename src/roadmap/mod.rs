//! Career roadmap generation on top of the pipeline and the vector store.

pub mod prompts;
mod service;
mod stages;

pub use service::{RoadmapService, build_roadmap_pipeline, roadmap_stages};
pub use stages::{
    PromptStage, RAG_EMPTY_CONTEXT, RagRetriever, ResourceCurator, WEB_SEARCH_UNAVAILABLE,
};
