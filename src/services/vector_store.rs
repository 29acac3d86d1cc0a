//! Embedding-backed similarity store.
//!
//! The store pairs a [`FlatL2Index`] with an ordered log of the chunk texts:
//! the chunk at position `i` of the log owns vector `i` of the index. The
//! embedding provider may be unreachable; in that case the store runs in a
//! degraded mode where writes fail and reads come back empty.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{EmbeddingError, VectorStoreError};
use crate::models::VectorStoreConfig;
use crate::services::embedding::TextEmbedder;
use crate::services::index::FlatL2Index;
use crate::services::persistence::IndexFiles;
use crate::utils::{RetryConfig, RetryResult, Retryable, calculate_checksum, preview, with_retry};

/// Whether the embedding provider answered its last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Ready,
    Degraded,
}

/// Snapshot of the store's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub has_index: bool,
    pub dimension: Option<usize>,
}

/// A retrieved chunk with its squared L2 distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub distance: f32,
}

#[derive(Debug, Default)]
struct StoreState {
    index: Option<FlatL2Index>,
    texts: Vec<String>,
    checksums: HashSet<String>,
    /// Bumped by every append and clear.
    generation: u64,
}

/// A copy of the index and chunk log taken under the write lock.
struct Snapshot {
    index: FlatL2Index,
    texts: Vec<String>,
    generation: u64,
}

impl StoreState {
    fn from_parts(index: FlatL2Index, texts: Vec<String>) -> Self {
        let checksums = texts.iter().map(|t| calculate_checksum(t)).collect();
        Self {
            index: Some(index),
            texts,
            checksums,
            generation: 0,
        }
    }
}

pub struct VectorStore {
    embedder: Arc<dyn TextEmbedder>,
    retry: RetryConfig,
    files: Option<IndexFiles>,
    dedupe: bool,
    provider: Mutex<ProviderStatus>,
    state: RwLock<StoreState>,
    /// Generation last written to disk. Held while touching the files so
    /// saves and removals land in order.
    persisted: Mutex<u64>,
}

impl VectorStore {
    /// Build a store: probe the provider with backoff, then load the persisted
    /// index if one is configured. Never fails; an unreachable provider leaves
    /// the store degraded and a broken persisted index leaves it empty.
    pub async fn open(embedder: Arc<dyn TextEmbedder>, config: &VectorStoreConfig) -> Self {
        let store = Self {
            embedder,
            retry: config.retry_config(),
            files: config.index_path.clone().map(IndexFiles::new),
            dedupe: config.dedupe,
            provider: Mutex::new(ProviderStatus::Degraded),
            state: RwLock::new(StoreState::default()),
            persisted: Mutex::new(0),
        };

        store.initialize().await;
        store.load_persisted().await;
        store
    }

    /// Probe the provider with the full retry budget.
    #[instrument(skip(self), fields(provider = %self.embedder.describe()))]
    pub async fn initialize(&self) -> ProviderStatus {
        let mut status = self.provider.lock().await;
        *status = self.probe(&self.retry).await;
        *status
    }

    /// Make sure the provider is usable, trying a single reconnect if the
    /// store is degraded. Returns true when ready.
    pub async fn ensure_ready(&self) -> bool {
        let mut status = self.provider.lock().await;
        if *status == ProviderStatus::Ready {
            return true;
        }

        info!("embedding provider not initialized, attempting to reconnect");
        *status = self.probe(&RetryConfig::single_attempt()).await;
        *status == ProviderStatus::Ready
    }

    async fn probe(&self, retry: &RetryConfig) -> ProviderStatus {
        let embedder = Arc::clone(&self.embedder);
        match with_retry(retry, || {
            let embedder = Arc::clone(&embedder);
            async move { embedder.probe().await }
        })
        .await
        {
            RetryResult::Success(dimension) => {
                info!(dimension, "embedding provider ready");
                ProviderStatus::Ready
            }
            RetryResult::Failed {
                last_error,
                attempts,
            } => {
                error!(
                    attempts,
                    error = %last_error,
                    "failed to initialize embedding provider"
                );
                warn!("vector store degraded: writes will fail and searches return nothing");
                ProviderStatus::Degraded
            }
        }
    }

    async fn mark_degraded(&self, err: &EmbeddingError) {
        if err.is_retryable() {
            *self.provider.lock().await = ProviderStatus::Degraded;
        }
    }

    pub async fn provider_status(&self) -> ProviderStatus {
        *self.provider.lock().await
    }

    pub fn provider_description(&self) -> String {
        self.embedder.describe()
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.files.as_ref().map(IndexFiles::index_path)
    }

    async fn load_persisted(&self) {
        let Some(files) = self.files.clone() else {
            return;
        };

        let loaded = match tokio::task::spawn_blocking({
            let files = files.clone();
            move || files.load()
        })
        .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "index load task failed, starting fresh");
                return;
            }
        };

        match loaded {
            Ok(Some((index, texts))) => {
                info!(
                    chunks = texts.len(),
                    path = %files.index_path().display(),
                    "loaded persisted vector store"
                );
                *self.state.write().await = StoreState::from_parts(index, texts);
            }
            Ok(None) => info!("no persisted index found, starting fresh"),
            Err(e) => warn!(error = %e, "failed to load persisted index, starting fresh"),
        }
    }

    /// Embed and store `texts`, returning how many chunks were added.
    ///
    /// With deduplication on, chunks whose content is already stored (or that
    /// repeat earlier in the same call) are skipped and not counted.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn add_texts(&self, texts: &[String]) -> Result<usize, VectorStoreError> {
        if texts.is_empty() {
            warn!("attempted to add an empty text list to the vector store");
            return Ok(0);
        }

        if !self.ensure_ready().await {
            return Err(VectorStoreError::ProviderUnavailable(
                self.embedder.describe(),
            ));
        }

        let candidates = {
            let state = self.state.read().await;
            self.select_new(&state, texts)
        };
        if candidates.is_empty() {
            info!("all chunks already stored");
            return Ok(0);
        }

        let mut vectors = Vec::with_capacity(candidates.len());
        for (_, text) in &candidates {
            match self.embedder.embed(text).await {
                Ok(vector) => vectors.push(vector),
                Err(e) => {
                    error!(error = %e, "failed to embed chunk");
                    self.mark_degraded(&e).await;
                    return Err(if e.is_retryable() {
                        VectorStoreError::ProviderUnavailable(e.to_string())
                    } else {
                        VectorStoreError::Embedding(e)
                    });
                }
            }
        }

        let mut state = self.state.write().await;

        // Another writer may have stored some of these while we were embedding
        let mut batch: Vec<(String, &String, Vec<f32>)> = candidates
            .into_iter()
            .zip(vectors)
            .map(|((checksum, text), vector)| (checksum, text, vector))
            .collect();
        if self.dedupe {
            batch.retain(|(checksum, _, _)| !state.checksums.contains(checksum));
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let vectors: Vec<Vec<f32>> = batch.iter().map(|(_, _, v)| v.clone()).collect();
        let mut index = match state.index.take() {
            Some(index) => index,
            None => {
                let index = FlatL2Index::new(vectors[0].len())?;
                info!(dimension = index.dimension(), "created new index");
                index
            }
        };

        if let Err(e) = index.add(&vectors) {
            error!(error = %e, "rejected chunks with mismatched embedding dimension");
            if !index.is_empty() {
                state.index = Some(index);
            }
            return Err(e.into());
        }
        state.index = Some(index);

        let added = batch.len();
        for (checksum, text, _) in batch {
            state.texts.push(text.clone());
            state.checksums.insert(checksum);
        }
        state.generation += 1;
        info!(added, total = state.texts.len(), "added texts to vector store");

        let snapshot = match (&self.files, &state.index) {
            (Some(_), Some(index)) => Some(Snapshot {
                index: index.clone(),
                texts: state.texts.clone(),
                generation: state.generation,
            }),
            _ => None,
        };
        drop(state);

        if let Some(snapshot) = snapshot {
            self.persist(snapshot).await;
        }

        Ok(added)
    }

    /// Write `snapshot` off the runtime threads, unless a newer generation
    /// (or a clear) already reached the disk.
    async fn persist(&self, snapshot: Snapshot) {
        let Some(files) = self.files.clone() else {
            return;
        };

        let mut persisted = self.persisted.lock().await;
        if snapshot.generation <= *persisted {
            debug!(generation = snapshot.generation, "skipping stale index save");
            return;
        }

        let generation = snapshot.generation;
        let path = files.index_path().to_path_buf();
        let saved =
            tokio::task::spawn_blocking(move || files.save(&snapshot.index, &snapshot.texts)).await;
        match saved {
            Ok(Ok(())) => {
                *persisted = generation;
                debug!(path = %path.display(), generation, "saved vector store");
            }
            Ok(Err(e)) => warn!(error = %e, "failed to save vector store index"),
            Err(e) => warn!(error = %e, "index save task failed"),
        }
    }

    fn select_new<'a>(&self, state: &StoreState, texts: &'a [String]) -> Vec<(String, &'a String)> {
        let mut seen = HashSet::new();
        texts
            .iter()
            .map(|text| (calculate_checksum(text), text))
            .filter(|(checksum, _)| {
                !self.dedupe || (!state.checksums.contains(checksum) && seen.insert(checksum.clone()))
            })
            .collect()
    }

    /// The `min(k, chunk_count)` chunks closest to `query`, most similar first.
    ///
    /// Never fails: an empty store, a degraded provider or an embedding error
    /// all produce an empty result.
    pub async fn search(&self, query: &str, k: usize) -> Vec<String> {
        self.search_scored(query, k)
            .await
            .into_iter()
            .map(|hit| hit.text)
            .collect()
    }

    /// Like [`search`](Self::search) but keeps the distances.
    #[instrument(skip(self, query), fields(query = %preview(query, 50)))]
    pub async fn search_scored(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        if self.state.read().await.texts.is_empty() {
            warn!("vector store is empty, returning empty results");
            return Vec::new();
        }
        if k == 0 {
            return Vec::new();
        }

        if !self.ensure_ready().await {
            error!("embedding provider unavailable, cannot search");
            return Vec::new();
        }

        let query_vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                error!(error = %e, "failed to embed search query");
                self.mark_degraded(&e).await;
                return Vec::new();
            }
        };

        let state = self.state.read().await;
        let Some(index) = state.index.as_ref() else {
            return Vec::new();
        };

        match index.search(&query_vector, k) {
            Ok(hits) => {
                let results: Vec<ScoredChunk> = hits
                    .into_iter()
                    .filter_map(|hit| {
                        state.texts.get(hit.position).map(|text| ScoredChunk {
                            text: text.clone(),
                            distance: hit.distance,
                        })
                    })
                    .collect();
                debug!(results = results.len(), "search completed");
                results
            }
            Err(e) => {
                error!(error = %e, "error searching vector store");
                Vec::new()
            }
        }
    }

    /// Drop every chunk and delete the persisted artifacts. Idempotent.
    pub async fn clear(&self) {
        let generation = {
            let mut state = self.state.write().await;
            let generation = state.generation + 1;
            *state = StoreState {
                generation,
                ..StoreState::default()
            };
            generation
        };
        info!("vector store cleared");

        let Some(files) = self.files.clone() else {
            return;
        };

        let mut persisted = self.persisted.lock().await;
        let path = files.index_path().to_path_buf();
        match tokio::task::spawn_blocking(move || files.remove()).await {
            Ok(Ok(())) => info!(path = %path.display(), "removed persisted index"),
            Ok(Err(e)) => warn!(error = %e, "failed to remove persisted index"),
            Err(e) => warn!(error = %e, "index removal task failed"),
        }
        *persisted = (*persisted).max(generation);
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            chunk_count: state.texts.len(),
            has_index: state.index.is_some(),
            dimension: state.index.as_ref().map(FlatL2Index::dimension),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubEmbedder;
    use std::time::Duration;

    fn config() -> VectorStoreConfig {
        VectorStoreConfig {
            backoff_base_ms: 1,
            ..Default::default()
        }
    }

    fn persisted_config(path: &Path) -> VectorStoreConfig {
        VectorStoreConfig {
            index_path: Some(path.to_path_buf()),
            ..config()
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn store_with(embedder: Arc<StubEmbedder>) -> VectorStore {
        VectorStore::open(embedder, &config()).await
    }

    async fn assert_counts_agree(store: &VectorStore) {
        let state = store.state.read().await;
        let index_len = state.index.as_ref().map_or(0, FlatL2Index::len);
        assert_eq!(state.texts.len(), index_len);
    }

    #[tokio::test]
    async fn test_add_reports_count_and_dimension() {
        let store = store_with(Arc::new(StubEmbedder::new(3))).await;

        let added = store
            .add_texts(&strings(&["x y z a b", "c d e"]))
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(
            store.stats().await,
            StoreStats {
                chunk_count: 2,
                has_index: true,
                dimension: Some(3),
            }
        );
    }

    #[tokio::test]
    async fn test_add_empty_is_noop() {
        let embedder = Arc::new(StubEmbedder::new(3));
        let store = store_with(Arc::clone(&embedder)).await;
        let calls = embedder.embed_calls();

        assert_eq!(store.add_texts(&[]).await.unwrap(), 0);
        assert_eq!(embedder.embed_calls(), calls);
        assert!(!store.stats().await.has_index);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let embedder = Arc::new(
            StubEmbedder::new(2)
                .with_vector("near", vec![1.0, 0.0])
                .with_vector("far", vec![5.0, 5.0])
                .with_vector("query", vec![0.0, 0.0]),
        );
        let store = store_with(embedder).await;
        store.add_texts(&strings(&["far", "near"])).await.unwrap();

        let results = store.search("query", 10).await;
        assert_eq!(results, strings(&["near", "far"]));

        let scored = store.search_scored("query", 10).await;
        assert_eq!(scored[0].distance, 1.0);
        assert_eq!(scored[1].distance, 50.0);
    }

    #[tokio::test]
    async fn test_search_clamps_k() {
        let store = store_with(Arc::new(StubEmbedder::new(4))).await;
        store
            .add_texts(&strings(&["alpha", "beta", "gamma"]))
            .await
            .unwrap();

        for k in 0..6 {
            assert_eq!(store.search("alpha", k).await.len(), k.min(3));
        }
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let store = store_with(Arc::new(StubEmbedder::new(3))).await;
        assert!(store.search("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_store_untouched() {
        let embedder = Arc::new(StubEmbedder::new(3).with_vector("wide", vec![1.0; 5]));
        let store = store_with(embedder).await;
        store.add_texts(&strings(&["first"])).await.unwrap();

        let err = store
            .add_texts(&strings(&["second", "wide"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 5
            }
        ));
        let stats = store.stats().await;
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.dimension, Some(3));
        assert_counts_agree(&store).await;
    }

    #[tokio::test]
    async fn test_mismatch_within_first_batch_creates_nothing() {
        let embedder = Arc::new(StubEmbedder::new(3).with_vector("wide", vec![1.0; 5]));
        let store = store_with(embedder).await;

        assert!(store.add_texts(&strings(&["ok", "wide"])).await.is_err());
        let stats = store.stats().await;
        assert_eq!(stats.chunk_count, 0);
        assert!(!stats.has_index);
    }

    #[tokio::test]
    async fn test_dimension_is_fixed_by_first_add() {
        let store = store_with(Arc::new(StubEmbedder::new(6))).await;
        for batch in [&["one"][..], &["two", "three"], &["four"]] {
            store.add_texts(&strings(batch)).await.unwrap();
            assert_counts_agree(&store).await;
        }

        let state = store.state.read().await;
        let index = state.index.as_ref().unwrap();
        assert_eq!(index.dimension(), 6);
        assert!((0..index.len()).all(|i| index.vector(i).unwrap().len() == 6));
    }

    #[tokio::test]
    async fn test_dedupe_skips_known_chunks() {
        let embedder = Arc::new(StubEmbedder::new(3));
        let store = store_with(Arc::clone(&embedder)).await;

        assert_eq!(
            store.add_texts(&strings(&["a", "b", "a"])).await.unwrap(),
            2
        );
        assert_eq!(store.add_texts(&strings(&["b", "c"])).await.unwrap(), 1);
        assert_eq!(store.stats().await.chunk_count, 3);
    }

    #[tokio::test]
    async fn test_racing_writers_store_shared_chunks_once() {
        let embedder = Arc::new(StubEmbedder::new(4).with_delay(Duration::from_millis(20)));
        let store = store_with(embedder).await;
        let chunks = strings(&["kubernetes", "terraform", "on-call"]);

        // Both calls select all three chunks before either one appends
        let (first, second) = tokio::join!(store.add_texts(&chunks), store.add_texts(&chunks));
        let mut added = [first.unwrap(), second.unwrap()];
        added.sort_unstable();

        assert_eq!(added, [0, 3]);
        assert_eq!(store.stats().await.chunk_count, 3);
        assert_counts_agree(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_searches_and_clear_keep_counts_aligned() {
        let embedder = Arc::new(StubEmbedder::new(8).with_delay(Duration::from_millis(1)));
        let store = Arc::new(store_with(embedder).await);
        let shared = strings(&["rust", "tokio", "serde", "tracing"]);

        let mut writers = Vec::new();
        for worker in 0..6 {
            let store = Arc::clone(&store);
            let mut batch = shared.clone();
            batch.push(format!("worker {worker} notes"));
            writers.push(tokio::spawn(async move {
                store.add_texts(&batch).await.unwrap()
            }));
        }

        let mut readers = Vec::new();
        for _ in 0..6 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                let hits = store.search("rust", 3).await;
                assert!(hits.len() <= 3);
                assert_counts_agree(&store).await;
            }));
        }

        let mut total_added = 0;
        for writer in writers {
            total_added += writer.await.unwrap();
        }
        for reader in readers {
            reader.await.unwrap();
        }

        // Four shared chunks stored once plus one private chunk per worker
        assert_eq!(total_added, 10);
        assert_eq!(store.stats().await.chunk_count, 10);
        assert_counts_agree(&store).await;
        {
            let state = store.state.read().await;
            assert_eq!(state.checksums.len(), state.texts.len());
        }

        let adder = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.add_texts(&strings(&["late chunk"])).await })
        };
        let clearer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.clear().await })
        };
        adder.await.unwrap().unwrap();
        clearer.await.unwrap();

        let state = store.state.read().await;
        assert!(state.texts.len() <= 1);
        assert_eq!(state.checksums.len(), state.texts.len());
        drop(state);
        assert_counts_agree(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_persist_latest_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let embedder = Arc::new(StubEmbedder::new(8).with_delay(Duration::from_millis(1)));
        let store = Arc::new(VectorStore::open(embedder, &persisted_config(&path)).await);

        let mut writers = Vec::new();
        for worker in 0..8 {
            let store = Arc::clone(&store);
            writers.push(tokio::spawn(async move {
                store
                    .add_texts(&[format!("chunk from worker {worker}")])
                    .await
                    .unwrap()
            }));
        }
        for writer in writers {
            assert_eq!(writer.await.unwrap(), 1);
        }

        let reopened =
            VectorStore::open(Arc::new(StubEmbedder::new(8)), &persisted_config(&path)).await;
        assert_eq!(reopened.stats().await.chunk_count, 8);
        assert_counts_agree(&reopened).await;
    }

    #[tokio::test]
    async fn test_dedupe_can_be_disabled() {
        let config = VectorStoreConfig {
            dedupe: false,
            ..config()
        };
        let store = VectorStore::open(Arc::new(StubEmbedder::new(3)), &config).await;

        assert_eq!(store.add_texts(&strings(&["a", "a"])).await.unwrap(), 2);
        assert_eq!(store.add_texts(&strings(&["a"])).await.unwrap(), 1);
        assert_eq!(store.stats().await.chunk_count, 3);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let store =
            VectorStore::open(Arc::new(StubEmbedder::new(3)), &persisted_config(&path)).await;
        store.add_texts(&strings(&["resume chunk"])).await.unwrap();
        assert!(path.exists());

        store.clear().await;
        store.clear().await;

        assert_eq!(
            store.stats().await,
            StoreStats {
                chunk_count: 0,
                has_index: false,
                dimension: None,
            }
        );
        assert!(store.search("resume", 3).await.is_empty());
        assert!(!path.exists());
        assert!(!path.with_extension("texts.json").exists());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("index.bin");
        let texts = strings(&["rust systems programming", "kubernetes operations", "sql tuning"]);

        {
            let store =
                VectorStore::open(Arc::new(StubEmbedder::new(8)), &persisted_config(&path)).await;
            store.add_texts(&texts).await.unwrap();
        }

        let reopened =
            VectorStore::open(Arc::new(StubEmbedder::new(8)), &persisted_config(&path)).await;
        assert_eq!(reopened.state.read().await.texts, texts);
        assert_eq!(reopened.stats().await.dimension, Some(8));
        for text in &texts {
            let results = reopened.search(text, 1).await;
            assert_eq!(results.first(), Some(text));
        }

        // Dedupe state is rebuilt from the loaded log
        assert_eq!(reopened.add_texts(&texts[..1]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_persisted_files_start_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"not an index").unwrap();

        let store =
            VectorStore::open(Arc::new(StubEmbedder::new(3)), &persisted_config(&path)).await;
        assert_eq!(store.stats().await.chunk_count, 0);

        // A good write replaces the broken artifacts
        store.add_texts(&strings(&["fresh"])).await.unwrap();
        assert!(IndexFiles::new(&path).load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_failure_does_not_fail_add() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let path = blocker.join("index.bin");

        let store =
            VectorStore::open(Arc::new(StubEmbedder::new(3)), &persisted_config(&path)).await;
        assert_eq!(store.add_texts(&strings(&["kept"])).await.unwrap(), 1);
        assert_eq!(store.stats().await.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_initialize_recovers_within_retry_budget() {
        let embedder = Arc::new(StubEmbedder::new(3).failing_first_probes(3));
        let store = store_with(Arc::clone(&embedder)).await;

        assert_eq!(store.provider_status().await, ProviderStatus::Ready);
        assert_eq!(embedder.probe_calls(), 4);
    }

    #[tokio::test]
    async fn test_initialize_degrades_after_retry_budget() {
        let embedder = Arc::new(StubEmbedder::new(3).failing_first_probes(4));
        let store = store_with(Arc::clone(&embedder)).await;

        assert_eq!(store.provider_status().await, ProviderStatus::Degraded);
        assert_eq!(embedder.probe_calls(), 4);
    }

    #[tokio::test]
    async fn test_degraded_write_retries_once_then_fails() {
        let embedder = Arc::new(StubEmbedder::new(3));
        embedder.set_down(true);
        let store = store_with(Arc::clone(&embedder)).await;
        let probes = embedder.probe_calls();

        let err = store.add_texts(&strings(&["chunk"])).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::ProviderUnavailable(_)));
        assert_eq!(embedder.probe_calls(), probes + 1);
        assert_eq!(store.stats().await.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_degraded_write_recovers_lazily() {
        let embedder = Arc::new(StubEmbedder::new(3));
        embedder.set_down(true);
        let store = store_with(Arc::clone(&embedder)).await;
        assert_eq!(store.provider_status().await, ProviderStatus::Degraded);

        embedder.set_down(false);
        assert_eq!(store.add_texts(&strings(&["chunk"])).await.unwrap(), 1);
        assert_eq!(store.provider_status().await, ProviderStatus::Ready);
    }

    #[tokio::test]
    async fn test_degraded_search_returns_empty() {
        let embedder = Arc::new(StubEmbedder::new(3));
        let store = store_with(Arc::clone(&embedder)).await;
        store.add_texts(&strings(&["chunk"])).await.unwrap();

        embedder.set_down(true);
        assert!(store.search("chunk", 1).await.is_empty());
        assert_eq!(store.provider_status().await, ProviderStatus::Degraded);

        embedder.set_down(false);
        assert_eq!(store.search("chunk", 1).await, strings(&["chunk"]));
    }

    #[tokio::test]
    async fn test_embed_failure_mid_batch_writes_nothing() {
        let embedder = Arc::new(StubEmbedder::new(3).failing_on("poison"));
        let store = store_with(embedder).await;

        let err = store
            .add_texts(&strings(&["fine", "poison pill"]))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Embedding(_)));
        assert_eq!(store.stats().await.chunk_count, 0);
        assert_counts_agree(&store).await;
    }
}
