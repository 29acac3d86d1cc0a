use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::stages::{PromptStage, RagRetriever, ResourceCurator};
use crate::error::{AppError, PipelineError};
use crate::models::{Config, PipelineConfig, RoadmapRequest, RoadmapResponse};
use crate::pipeline::{Field, NoopObserver, PipelineExecutor, PipelineObserver, Stage};
use crate::services::{
    OllamaEmbedder, OllamaGenerator, TavilyClient, TextChunker, TextGenerator, VectorStore,
    WebSearch,
};

/// The six roadmap stages in execution order.
pub fn roadmap_stages(
    generator: Arc<dyn TextGenerator>,
    store: Arc<VectorStore>,
    search: Option<Arc<dyn WebSearch>>,
    retrieval_k: usize,
    max_results: u32,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(PromptStage::topic_analyzer(Arc::clone(&generator))),
        Box::new(PromptStage::skill_gap_agent(Arc::clone(&generator))),
        Box::new(PromptStage::curriculum_planner(Arc::clone(&generator))),
        Box::new(RagRetriever::new(store, retrieval_k)),
        Box::new(ResourceCurator::new(search, max_results)),
        Box::new(PromptStage::validator(generator)),
    ]
}

pub fn build_roadmap_pipeline(
    stages: Vec<Box<dyn Stage>>,
    config: &PipelineConfig,
) -> Result<PipelineExecutor, PipelineError> {
    Ok(PipelineExecutor::new(stages)?
        .with_stage_timeout(Duration::from_secs(config.stage_timeout_secs))
        .with_result_field(Field::Roadmap)
        .with_required_inputs([Field::Topic, Field::Resume]))
}

/// Validates requests, indexes resumes and runs the roadmap pipeline.
pub struct RoadmapService {
    store: Arc<VectorStore>,
    executor: PipelineExecutor,
    chunker: TextChunker,
    limits: PipelineConfig,
}

impl RoadmapService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<VectorStore>,
        search: Option<Arc<dyn WebSearch>>,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        let stages = roadmap_stages(
            generator,
            Arc::clone(&store),
            search,
            config.pipeline.retrieval_k,
            config.web_search.max_results,
        );

        Ok(Self {
            store,
            executor: build_roadmap_pipeline(stages, &config.pipeline)?,
            chunker: TextChunker::from_config(&config.pipeline),
            limits: config.pipeline.clone(),
        })
    }

    /// Wire up the Ollama and Tavily clients described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
        let generator = Arc::new(OllamaGenerator::new(&config.generation)?);
        let search = TavilyClient::from_config(&config.web_search)?
            .map(|client| Arc::new(client) as Arc<dyn WebSearch>);
        if search.is_none() {
            warn!("TAVILY_API_KEY not set, web search will be disabled");
        }

        let store = Arc::new(VectorStore::open(embedder, &config.vector_store).await);
        Ok(Self::new(generator, store, search, config)?)
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.executor.stage_names()
    }

    /// Chunk and store a resume. Indexing problems are logged and reported
    /// as zero chunks; retrieval then works with whatever the store holds.
    pub async fn index_resume(&self, resume: &str) -> usize {
        let chunks = self.chunker.chunk(resume);
        match self.store.add_texts(&chunks).await {
            Ok(added) => {
                info!(chunks = chunks.len(), added, "indexed resume");
                added
            }
            Err(e) => {
                error!(error = %e, "failed to index resume, continuing without it");
                0
            }
        }
    }

    pub async fn generate(&self, request: &RoadmapRequest) -> Result<RoadmapResponse, AppError> {
        self.generate_with_observer(request, &NoopObserver).await
    }

    #[instrument(skip_all, fields(topic = %request.topic.trim()))]
    pub async fn generate_with_observer(
        &self,
        request: &RoadmapRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<RoadmapResponse, AppError> {
        request.validate(&self.limits)?;

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(run_id = %run_id, "generating roadmap");

        let indexed = self.index_resume(&request.resume).await;
        let run = self
            .executor
            .run_with_observer(request.to_state(), observer)
            .await?;

        let elapsed = started.elapsed().as_millis() as u64;
        let response = RoadmapResponse::from_run(run_id, run, indexed, elapsed);
        info!(
            run_id = %response.run_id,
            processing_time_ms = elapsed,
            failed_stages = response.failed_stages().count(),
            "roadmap generated"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::roadmap::stages::{RAG_EMPTY_CONTEXT, WEB_SEARCH_UNAVAILABLE};
    use crate::testing::{ScriptedGenerator, StubEmbedder, StubSearch};

    const RESUME: &str = "Platform engineer. Five years running Kubernetes clusters, \
        writing Terraform modules and on-call for payment services.";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.vector_store.backoff_base_ms = 1;
        config
    }

    async fn store(embedder: StubEmbedder) -> Arc<VectorStore> {
        Arc::new(VectorStore::open(Arc::new(embedder), &test_config().vector_store).await)
    }

    async fn service(
        generator: Arc<ScriptedGenerator>,
        embedder: StubEmbedder,
        search: Option<Arc<dyn WebSearch>>,
    ) -> RoadmapService {
        RoadmapService::new(generator, store(embedder).await, search, &test_config()).unwrap()
    }

    #[tokio::test]
    async fn test_stage_order() {
        let service = service(Arc::new(ScriptedGenerator::new()), StubEmbedder::new(8), None).await;
        assert_eq!(
            service.stage_names(),
            vec![
                "topic_analyzer",
                "skill_gap_agent",
                "curriculum_planner",
                "rag_retriever",
                "resource_curator",
                "validator"
            ]
        );
    }

    #[tokio::test]
    async fn test_full_run() {
        let generator = Arc::new(ScriptedGenerator::new());
        let search: Arc<dyn WebSearch> = Arc::new(StubSearch::new());
        let service = service(generator.clone(), StubEmbedder::new(8), Some(search)).await;

        let request = RoadmapRequest::new("Site Reliability Engineer", RESUME);
        let response = service.generate(&request).await.unwrap();

        assert_eq!(response.analysis, "generated #1");
        assert_eq!(response.skill_gaps, "generated #2");
        assert_eq!(response.curriculum, "generated #3");
        assert_eq!(response.roadmap, "generated #4");
        assert!(response.rag_context.contains("Kubernetes"));
        assert_eq!(response.resources.lines().count(), 15);
        assert_eq!(response.indexed_chunks, 1);
        assert_eq!(response.stages.len(), 6);
        assert_eq!(response.failed_stages().count(), 0);
        assert!(Uuid::parse_str(&response.run_id).is_ok());

        let prompts = generator.prompts();
        assert!(prompts[1].contains("Job description:\nNot provided"));
        assert!(prompts[2].contains("generated #2") && prompts[2].contains("generated #1"));
        assert!(prompts[3].contains("generated #3") && prompts[3].contains("Kubernetes"));
    }

    #[tokio::test]
    async fn test_failed_stage_does_not_stop_run() {
        // The skill gap prompt is the only one that embeds the resume
        let generator = Arc::new(ScriptedGenerator::new().failing_on("Terraform modules"));
        let service = service(generator, StubEmbedder::new(8), None).await;

        let request = RoadmapRequest::new("SRE", RESUME);
        let response = service.generate(&request).await.unwrap();

        assert!(
            response
                .skill_gaps
                .starts_with("Error performing skill gap analysis: ")
        );
        // The validator prompt carries the retrieved resume text too
        assert!(response.roadmap.starts_with("Error generating roadmap: "));
        assert_eq!(response.analysis, "generated #1");
        assert_eq!(response.curriculum, "generated #3");

        let failed: Vec<&str> = response.failed_stages().map(|r| r.name.as_str()).collect();
        assert_eq!(failed, vec!["skill_gap_agent", "validator"]);
    }

    #[tokio::test]
    async fn test_degraded_store_still_produces_roadmap() {
        let embedder = StubEmbedder::new(8);
        embedder.set_down(true);
        let service = service(Arc::new(ScriptedGenerator::new()), embedder, None).await;

        let response = service
            .generate(&RoadmapRequest::new("SRE", RESUME))
            .await
            .unwrap();

        assert_eq!(response.indexed_chunks, 0);
        assert_eq!(response.rag_context, RAG_EMPTY_CONTEXT);
        assert!(response.resources.starts_with(WEB_SEARCH_UNAVAILABLE));
        assert_eq!(response.roadmap, "generated #4");
    }

    #[tokio::test]
    async fn test_stage_timeout_is_isolated() {
        let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(200)));
        let mut config = test_config();
        config.pipeline.stage_timeout_secs = 0;
        let service = RoadmapService::new(
            generator,
            store(StubEmbedder::new(8)).await,
            None,
            &config,
        )
        .unwrap();

        let response = service
            .generate(&RoadmapRequest::new("SRE", RESUME))
            .await
            .unwrap();

        assert!(response.analysis.starts_with("Error analyzing topic: stage timed out"));
        assert!(response.roadmap.starts_with("Error generating roadmap: stage timed out"));
        assert_eq!(response.stages.len(), 6);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::new());
        let service = service(generator.clone(), StubEmbedder::new(8), None).await;

        let err = service
            .generate(&RoadmapRequest::new("SRE", "short resume"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Request(RequestError::ResumeTooShort { .. })
        ));
        assert!(generator.prompts().is_empty());
        assert_eq!(service.store().stats().await.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_repeat_resume_is_not_reindexed() {
        let service = service(Arc::new(ScriptedGenerator::new()), StubEmbedder::new(8), None).await;

        assert_eq!(service.index_resume(RESUME).await, 1);
        assert_eq!(service.index_resume(RESUME).await, 0);
        assert_eq!(service.store().stats().await.chunk_count, 1);
    }
}
