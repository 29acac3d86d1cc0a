//! The stages of the roadmap pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::prompts;
use crate::error::StageError;
use crate::pipeline::{Field, PipelineState, Stage, StateUpdate};
use crate::services::{TextGenerator, VectorStore, WebSearch, estimate_tokens};

pub const RAG_EMPTY_CONTEXT: &str = "No relevant context found in knowledge base.";
pub const WEB_SEARCH_UNAVAILABLE: &str = "Web search unavailable: API key not configured";

type PromptBuilder = fn(&PipelineState) -> String;

/// A stage that renders one prompt from the state and stores the completion
/// in a single field.
pub struct PromptStage {
    name: &'static str,
    reads: &'static [Field],
    writes: [Field; 1],
    failure_prefix: &'static str,
    prompt: PromptBuilder,
    generator: Arc<dyn TextGenerator>,
}

impl PromptStage {
    pub fn topic_analyzer(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            name: "topic_analyzer",
            reads: &[Field::Topic],
            writes: [Field::Analysis],
            failure_prefix: "Error analyzing topic",
            prompt: |s| prompts::topic_analysis(&s.topic),
            generator,
        }
    }

    pub fn skill_gap_agent(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            name: "skill_gap_agent",
            reads: &[Field::Topic, Field::Resume, Field::Jd],
            writes: [Field::SkillGaps],
            failure_prefix: "Error performing skill gap analysis",
            prompt: |s| prompts::skill_gap(&s.topic, &s.resume, &s.jd),
            generator,
        }
    }

    pub fn curriculum_planner(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            name: "curriculum_planner",
            reads: &[Field::SkillGaps, Field::Analysis],
            writes: [Field::Curriculum],
            failure_prefix: "Error creating curriculum",
            prompt: |s| prompts::curriculum(&s.skill_gaps, &s.analysis),
            generator,
        }
    }

    pub fn validator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            name: "validator",
            reads: &[Field::Curriculum, Field::RagContext, Field::Resources],
            writes: [Field::Roadmap],
            failure_prefix: "Error generating roadmap",
            prompt: |s| prompts::roadmap(&s.curriculum, &s.rag_context, &s.resources),
            generator,
        }
    }
}

#[async_trait]
impl Stage for PromptStage {
    fn name(&self) -> &str {
        self.name
    }

    fn reads(&self) -> &[Field] {
        self.reads
    }

    fn writes(&self) -> &[Field] {
        &self.writes
    }

    fn failure_prefix(&self) -> String {
        self.failure_prefix.to_string()
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let prompt = (self.prompt)(state);
        debug!(
            stage = self.name,
            prompt_tokens = estimate_tokens(&prompt),
            "sending prompt"
        );

        let output = self.generator.generate(&prompt).await?;
        info!(stage = self.name, chars = output.len(), "generation completed");
        Ok(StateUpdate::new().with(self.writes[0], output))
    }
}

/// Pulls the chunks most related to the topic out of the vector store.
pub struct RagRetriever {
    store: Arc<VectorStore>,
    k: usize,
}

impl RagRetriever {
    pub fn new(store: Arc<VectorStore>, k: usize) -> Self {
        Self { store, k }
    }

    pub fn query(topic: &str) -> String {
        format!("Learning resources for {topic} skills")
    }
}

#[async_trait]
impl Stage for RagRetriever {
    fn name(&self) -> &str {
        "rag_retriever"
    }

    fn reads(&self) -> &[Field] {
        &[Field::Topic]
    }

    fn writes(&self) -> &[Field] {
        &[Field::RagContext]
    }

    fn failure_prefix(&self) -> String {
        "Error retrieving context from knowledge base".to_string()
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let chunks = self.store.search(&Self::query(&state.topic), self.k).await;
        info!(chunks = chunks.len(), "retrieved context chunks");

        let context = if chunks.is_empty() {
            RAG_EMPTY_CONTEXT.to_string()
        } else {
            chunks.join("\n")
        };
        Ok(StateUpdate::new().with(Field::RagContext, context))
    }
}

/// Looks up courses, projects and interview material on the web.
///
/// Each lookup is independent: a failed one contributes an inline error line
/// and the others still run.
pub struct ResourceCurator {
    search: Option<Arc<dyn WebSearch>>,
    max_results: u32,
}

impl ResourceCurator {
    pub fn new(search: Option<Arc<dyn WebSearch>>, max_results: u32) -> Self {
        Self {
            search,
            max_results,
        }
    }

    pub fn queries(topic: &str) -> [String; 3] {
        [
            format!("Best courses for {topic}"),
            format!("Projects for {topic}"),
            format!("Interview prep for {topic}"),
        ]
    }
}

#[async_trait]
impl Stage for ResourceCurator {
    fn name(&self) -> &str {
        "resource_curator"
    }

    fn reads(&self) -> &[Field] {
        &[Field::Topic]
    }

    fn writes(&self) -> &[Field] {
        &[Field::Resources]
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StageError> {
        let mut sections = Vec::new();

        for query in Self::queries(&state.topic) {
            let Some(search) = &self.search else {
                warn!("web search client not configured");
                sections.push(WEB_SEARCH_UNAVAILABLE.to_string());
                continue;
            };

            match search.search(&query, self.max_results).await {
                Ok(urls) => {
                    info!(query = %query, results = urls.len(), "web search completed");
                    sections.push(urls.join("\n"));
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "web search failed");
                    sections.push(format!("Error searching web: {e}"));
                }
            }
        }

        Ok(StateUpdate::new().with(Field::Resources, sections.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorStoreConfig;
    use crate::testing::{ScriptedGenerator, StubEmbedder, StubSearch};

    #[tokio::test]
    async fn test_prompt_stage_writes_completion() {
        let generator = Arc::new(ScriptedGenerator::new());
        let stage = PromptStage::topic_analyzer(generator.clone());
        let state = PipelineState::new("Data Engineer", "", "");

        let update = stage.run(&state).await.unwrap();
        assert_eq!(update.get(Field::Analysis), Some("generated #1"));
        assert!(generator.prompts()[0].contains("Data Engineer"));
    }

    #[tokio::test]
    async fn test_prompt_stage_propagates_generator_error() {
        let generator = Arc::new(ScriptedGenerator::new().failing_on("Data Engineer"));
        let stage = PromptStage::topic_analyzer(generator);

        let err = stage
            .run(&PipelineState::new("Data Engineer", "", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Generation(_)));
        assert_eq!(stage.failure_prefix(), "Error analyzing topic");
    }

    #[tokio::test]
    async fn test_rag_retriever_empty_store() {
        let store = Arc::new(
            VectorStore::open(Arc::new(StubEmbedder::new(4)), &VectorStoreConfig::default())
                .await,
        );
        let stage = RagRetriever::new(store, 5);

        let update = stage.run(&PipelineState::new("SRE", "", "")).await.unwrap();
        assert_eq!(update.get(Field::RagContext), Some(RAG_EMPTY_CONTEXT));
    }

    #[tokio::test]
    async fn test_rag_retriever_joins_chunks() {
        let store = Arc::new(
            VectorStore::open(Arc::new(StubEmbedder::new(4)), &VectorStoreConfig::default())
                .await,
        );
        store
            .add_texts(&["kubernetes on call".to_string(), "terraform modules".to_string()])
            .await
            .unwrap();
        let stage = RagRetriever::new(store, 5);

        let update = stage.run(&PipelineState::new("SRE", "", "")).await.unwrap();
        let context = update.get(Field::RagContext).unwrap();
        assert_eq!(context.lines().count(), 2);
        assert!(context.contains("terraform modules"));
    }

    #[tokio::test]
    async fn test_resource_curator_without_client() {
        let stage = ResourceCurator::new(None, 5);
        let update = stage.run(&PipelineState::new("SRE", "", "")).await.unwrap();

        let resources = update.get(Field::Resources).unwrap();
        assert_eq!(resources.lines().count(), 3);
        assert!(resources.lines().all(|l| l == WEB_SEARCH_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_resource_curator_isolates_failed_lookup() {
        let search = Arc::new(StubSearch::new().failing_on("Projects"));
        let stage = ResourceCurator::new(Some(search.clone()), 2);
        let update = stage.run(&PipelineState::new("SRE", "", "")).await.unwrap();

        let lines: Vec<&str> = update.get(Field::Resources).unwrap().lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("https://"));
        assert!(lines[2].starts_with("Error searching web:"));
        assert!(lines[3].starts_with("https://"));
        assert_eq!(
            search.queries(),
            vec!["Best courses for SRE", "Projects for SRE", "Interview prep for SRE"]
        );
    }
}
