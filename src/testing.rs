//! Deterministic stand-ins for the remote providers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EmbeddingError, GenerationError, WebSearchError};
use crate::services::{TextEmbedder, TextGenerator, WebSearch};

/// Embeds text as a bag of characters folded into `dimension` buckets,
/// unless an explicit vector was registered for the exact text.
pub struct StubEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
    delay: Option<Duration>,
    failing_probes: AtomicUsize,
    down: AtomicBool,
    probe_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            fail_on: None,
            delay: None,
            failing_probes: AtomicUsize::new(0),
            down: AtomicBool::new(false),
            probe_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// The first `n` probes fail with a connection error.
    pub fn failing_first_probes(self, n: usize) -> Self {
        self.failing_probes.store(n, Ordering::SeqCst);
        self
    }

    /// Embedding any text containing `marker` fails with a non-retryable error.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    /// Every `embed` call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// While down, every call fails with a connection error.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self.vectors.get(text) {
            return vector.clone();
        }
        let mut vector = vec![0.0; self.dimension];
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            vector[c as usize % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl TextEmbedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        if let Some(marker) = &self.fail_on
            && text.contains(marker.as_str())
        {
            return Err(EmbeddingError::InvalidResponse("rejected input".to_string()));
        }
        Ok(self.vector_for(text))
    }

    async fn probe(&self) -> Result<usize, EmbeddingError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_probes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_probes.store(remaining - 1, Ordering::SeqCst);
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        Ok(self.dimension)
    }

    fn describe(&self) -> String {
        format!("stub ({} dims)", self.dimension)
    }
}

/// Answers "generated #n" for the n-th call and records every prompt.
#[derive(Default)]
pub struct ScriptedGenerator {
    fail_on: Vec<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts containing `marker` fail with a server error.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on.push(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.iter().any(|m| prompt.contains(m.as_str())) {
            return Err(GenerationError::ServerError(
                "status 500 Internal Server Error: model crashed".to_string(),
            ));
        }
        Ok(format!("generated #{call}"))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Returns `https://example.com/<n>` style URLs and records every query.
#[derive(Default)]
pub struct StubSearch {
    fail_on: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on.push(marker.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WebSearch for StubSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, WebSearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail_on.iter().any(|m| query.contains(m.as_str())) {
            return Err(WebSearchError::ServerError("status 432: quota exceeded".to_string()));
        }
        let slug = query.to_lowercase().replace(' ', "-");
        Ok((1..=max_results)
            .map(|n| format!("https://example.com/{slug}/{n}"))
            .collect())
    }
}
