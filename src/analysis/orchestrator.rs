use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::cache::{RecencyCache, SentimentCache};
use crate::context::ContextAggregator;
use crate::models::{RequestContext, SentimentAnalysisResult};
use crate::providers::{
    check_dimension, embed_in_chunks, EmbeddingProvider, Metadata, VectorQuery, VectorRecord,
    VectorStore,
};
use crate::recovery::{AnalysisError, ErrorKind, RecoveryExecutor};
use crate::scoring::{LexicalScoringEngine, Lexicon, SentimentStrategy};
use crate::settings::AnalysisSettings;

use super::observer::{ObserverId, SentimentObserver};
use super::state::ServiceState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Single entry point for message sentiment.
///
/// Composes the content-addressed cache, the active scoring strategy, the
/// vector-similarity context lookup and retry handling. Shared across tasks
/// behind an `Arc`; every method takes `&self`.
pub struct SentimentAnalyzer {
    embeddings: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    cache: SentimentCache,
    lexicon: Lexicon,
    settings: AnalysisSettings,
    recovery: RecoveryExecutor,
    aggregator: ContextAggregator,
    strategy: RwLock<Arc<dyn SentimentStrategy>>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn SentimentObserver>)>>,
    next_observer_id: AtomicU64,
    state: Mutex<ServiceState>,
    init_lock: tokio::sync::Mutex<()>,
    reference_embeddings: Mutex<RecencyCache<String, Vec<f32>>>,
}

impl SentimentAnalyzer {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        cache: SentimentCache,
        lexicon: Lexicon,
        settings: AnalysisSettings,
    ) -> Self {
        let strategy: Arc<dyn SentimentStrategy> =
            Arc::new(LexicalScoringEngine::new(lexicon.clone()));
        let reference_capacity = settings.reference_cache_capacity;

        Self {
            embeddings,
            vectors,
            cache,
            lexicon,
            settings,
            recovery: RecoveryExecutor::new(),
            aggregator: ContextAggregator::new(),
            strategy: RwLock::new(strategy),
            observers: RwLock::new(Vec::new()),
            next_observer_id: AtomicU64::new(1),
            state: Mutex::new(ServiceState::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            reference_embeddings: Mutex::new(RecencyCache::new(reference_capacity)),
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryExecutor) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn state(&self) -> ServiceState {
        *lock(&self.state)
    }

    fn set_state(&self, next: ServiceState) {
        let mut guard = lock(&self.state);
        if *guard != next {
            log_info!("Sentiment service {} -> {}", guard.as_str(), next.as_str());
            *guard = next;
        }
    }

    /// Embed every anchor term once and become `Ready`. Idempotent.
    pub async fn initialize(&self) -> Result<(), AnalysisError> {
        let _guard = self.init_lock.lock().await;
        if self.state() == ServiceState::Ready {
            return Ok(());
        }

        self.set_state(ServiceState::Initializing);
        match self.load_reference_embeddings().await {
            Ok(count) => {
                log_info!("Sentiment service ready with {} reference embeddings", count);
                self.set_state(ServiceState::Ready);
                Ok(())
            }
            Err(err) => {
                log_error!("Sentiment service initialization failed: {err}");
                self.set_state(ServiceState::Uninitialized);
                Err(err)
            }
        }
    }

    async fn load_reference_embeddings(&self) -> Result<usize, AnalysisError> {
        let terms: Vec<String> = self.lexicon.all_terms().map(str::to_string).collect();
        let provider = self.embeddings.as_ref();
        let store = self.vectors.as_ref();
        let batch_size = self.settings.embedding_batch_size;
        let term_slice = terms.as_slice();

        let vectors = self
            .recovery
            .retry(ErrorKind::Initialization, move || async move {
                store
                    .ensure_index()
                    .await
                    .context("failed to prepare vector index")?;
                embed_in_chunks(provider, term_slice, batch_size)
                    .await
                    .context("failed to embed anchor terms")
            })
            .await?;

        let mut cache = lock(&self.reference_embeddings);
        cache.clear();
        for (term, vector) in terms.into_iter().zip(vectors) {
            cache.insert(term, vector);
        }
        Ok(cache.len())
    }

    pub fn reference_embedding(&self, term: &str) -> Option<Vec<f32>> {
        lock(&self.reference_embeddings).get(term).cloned()
    }

    pub fn reference_embedding_count(&self) -> usize {
        lock(&self.reference_embeddings).len()
    }

    pub fn set_strategy(&self, strategy: Arc<dyn SentimentStrategy>) {
        log_info!("Switching scoring strategy to {}", strategy.name());
        *write(&self.strategy) = strategy;
    }

    pub fn strategy_name(&self) -> String {
        read(&self.strategy).name().to_string()
    }

    pub fn add_observer(&self, observer: Arc<dyn SentimentObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        write(&self.observers).push((id, observer));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = write(&self.observers);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Analyze one message.
    ///
    /// An unexpired cache hit for the same text short-circuits embedding and
    /// similarity lookup. Otherwise the result is persisted in the
    /// background after it has been returned.
    pub async fn analyze(
        &self,
        text: &str,
        request: &RequestContext,
    ) -> Result<SentimentAnalysisResult, AnalysisError> {
        if self.state() != ServiceState::Ready {
            self.initialize().await?;
        }

        let now = Utc::now();
        match self.cache.lookup(text, &request.room_id, now).await {
            Ok(Some(entry)) => {
                log_debug!("Cache hit for message {}", entry.message_hash);
                let result = entry.to_result();
                self.notify_observers(text, &result);
                return Ok(result);
            }
            Ok(None) => {}
            Err(err) => log_debug!("Cache lookup failed, analyzing from scratch: {err:#}"),
        }

        let embedding = self.embed(text).await?;
        let strategy = Arc::clone(&*read(&self.strategy));
        let score = strategy.analyze(text, &embedding);
        let matches = self.similar(&embedding).await?;
        let context = self.aggregator.aggregate(&matches, score.category);

        let result = SentimentAnalysisResult { score, context };
        self.persist_in_background(text, embedding, result, request, now);
        self.notify_observers(text, &result);
        Ok(result)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AnalysisError> {
        let provider = self.embeddings.as_ref();
        let dimension = self.settings.embedding_dimension;
        self.recovery
            .retry(ErrorKind::Embedding, move || async move {
                let vector = provider.generate_embedding(text).await?;
                check_dimension(&vector, dimension)?;
                Ok::<_, anyhow::Error>(vector)
            })
            .await
    }

    async fn similar(
        &self,
        embedding: &[f32],
    ) -> Result<Vec<crate::providers::VectorMatch>, AnalysisError> {
        let store = self.vectors.as_ref();
        let top_k = self.settings.top_k;
        self.recovery
            .retry(ErrorKind::VectorStore, move || {
                store.query(VectorQuery {
                    vector: embedding.to_vec(),
                    top_k,
                    include_metadata: true,
                })
            })
            .await
    }

    /// Fire-and-forget: failures are logged at debug and never reach the
    /// caller. Not retried.
    fn persist_in_background(
        &self,
        text: &str,
        embedding: Vec<f32>,
        result: SentimentAnalysisResult,
        request: &RequestContext,
        now: DateTime<Utc>,
    ) {
        let cache = self.cache.clone();
        let vectors = Arc::clone(&self.vectors);
        let text = text.to_string();
        let request = request.clone();

        tokio::spawn(async move {
            let record = VectorRecord {
                id: Uuid::new_v4().to_string(),
                values: embedding.clone(),
                metadata: neighbor_metadata(&result, &request, now),
            };

            if let Err(err) = cache.store(&text, embedding, &result, &request, now).await {
                log_debug!("Background cache write failed: {err:#}");
            }
            if let Err(err) = vectors.upsert(vec![record]).await {
                log_debug!("Background vector upsert failed: {err:#}");
            }
        });
    }

    fn notify_observers(&self, text: &str, result: &SentimentAnalysisResult) {
        let observers: Vec<(ObserverId, Arc<dyn SentimentObserver>)> =
            read(&self.observers).clone();

        for (id, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_analysis(text, result))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log_warn!("Observer {:?} failed: {err:#}", id),
                Err(_) => log_error!("Observer {:?} panicked", id),
            }
        }
    }

    /// Drop reference embeddings, purge expired cache rows and return to
    /// `Uninitialized`. Returns the number of purged rows.
    pub async fn cleanup(&self) -> Result<usize, AnalysisError> {
        let _guard = self.init_lock.lock().await;
        lock(&self.reference_embeddings).clear();
        self.set_state(ServiceState::Uninitialized);

        let purged = self
            .cache
            .purge_expired(Utc::now())
            .await
            .map_err(|err| AnalysisError::from_kind(ErrorKind::Cache, 1, err))?;
        if purged > 0 {
            log_info!("Purged {} expired cache entries", purged);
        }
        Ok(purged)
    }
}

fn neighbor_metadata(
    result: &SentimentAnalysisResult,
    request: &RequestContext,
    now: DateTime<Utc>,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("category".into(), json!(result.score.category.as_str()));
    metadata.insert("score".into(), json!(result.score.score));
    metadata.insert("room_id".into(), json!(request.room_id));
    metadata.insert("user_id".into(), json!(request.user_id));
    metadata.insert("timestamp".into(), json!(now.timestamp_millis()));
    metadata
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{SentimentCategory, SentimentScore};
    use crate::providers::{HashingEmbedder, InMemoryVectorStore};
    use crate::settings::CacheSettings;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const DIM: usize = 32;

    /// Wraps the hashing embedder, counting calls and optionally failing.
    struct TestEmbedder {
        inner: HashingEmbedder,
        single_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        fail: bool,
    }

    impl TestEmbedder {
        fn new(fail: bool) -> Self {
            Self {
                inner: HashingEmbedder::new(DIM),
                single_calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TestEmbedder {
        fn dimension(&self) -> usize {
            DIM
        }

        async fn generate_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("embedding service unavailable");
            }
            self.inner.generate_embedding(text).await
        }

        async fn generate_batch_embeddings(
            &self,
            texts: &[String],
        ) -> anyhow::Result<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("embedding service unavailable");
            }
            self.inner.generate_batch_embeddings(texts).await
        }
    }

    struct FixedStrategy(f64);

    impl SentimentStrategy for FixedStrategy {
        fn analyze(&self, _text: &str, _embedding: &[f32]) -> SentimentScore {
            SentimentScore {
                score: self.0,
                category: SentimentCategory::from_score(self.0),
                confidence: 1.0,
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Index creation works; queries and upserts fail on demand.
    #[derive(Default)]
    struct TestStore {
        fail_query: bool,
        fail_upsert: bool,
        queries: AtomicUsize,
        upserts: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for TestStore {
        async fn ensure_index(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn query(
            &self,
            _query: VectorQuery,
        ) -> anyhow::Result<Vec<crate::providers::VectorMatch>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_query {
                anyhow::bail!("similarity index offline");
            }
            Ok(Vec::new())
        }

        async fn upsert(&self, _records: Vec<VectorRecord>) -> anyhow::Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_upsert {
                anyhow::bail!("similarity index read-only");
            }
            Ok(())
        }
    }

    fn analyzer(embedder: Arc<TestEmbedder>) -> (SentimentAnalyzer, SentimentCache) {
        let db = Database::in_memory().expect("db");
        analyzer_with(embedder, Arc::new(InMemoryVectorStore::new()), db)
    }

    fn analyzer_with(
        embedder: Arc<TestEmbedder>,
        store: Arc<dyn VectorStore>,
        db: Database,
    ) -> (SentimentAnalyzer, SentimentCache) {
        let cache = SentimentCache::new(db, &CacheSettings::default());
        let settings = AnalysisSettings {
            embedding_dimension: DIM,
            ..AnalysisSettings::default()
        };
        let analyzer = SentimentAnalyzer::new(
            embedder,
            store,
            cache.clone(),
            Lexicon::default(),
            settings,
        )
        .with_recovery(RecoveryExecutor::with_backoff_override(Duration::from_millis(1)));
        (analyzer, cache)
    }

    async fn wait_for_cache(cache: &SentimentCache, text: &str, room: &str) {
        for _ in 0..200 {
            if let Ok(Some(_)) = cache.lookup(text, room, Utc::now()).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("background cache write never landed");
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let embedder = Arc::new(TestEmbedder::new(false));
        let (analyzer, _) = analyzer(Arc::clone(&embedder));

        analyzer.initialize().await.unwrap();
        let batches = embedder.batch_calls.load(Ordering::SeqCst);
        analyzer.initialize().await.unwrap();

        assert_eq!(analyzer.state(), ServiceState::Ready);
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), batches);
        assert_eq!(analyzer.reference_embedding_count(), Lexicon::default().len());
        assert_eq!(analyzer.reference_embedding("moon").map(|v| v.len()), Some(DIM));
    }

    #[tokio::test]
    async fn failed_initialization_returns_to_uninitialized() {
        let embedder = Arc::new(TestEmbedder::new(true));
        let (analyzer, _) = analyzer(Arc::clone(&embedder));

        let err = analyzer.initialize().await.expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(analyzer.state(), ServiceState::Uninitialized);
        assert_eq!(analyzer.reference_embedding_count(), 0);
    }

    #[tokio::test]
    async fn analyze_initializes_lazily_and_scores_text() {
        let (analyzer, _) = analyzer(Arc::new(TestEmbedder::new(false)));

        let result = analyzer
            .analyze("this is amazing, to the moon", &RequestContext::new("u1", "r1"))
            .await
            .unwrap();

        assert_eq!(analyzer.state(), ServiceState::Ready);
        assert!(result.score.score > 0.0);
        assert!((0.0..=1.0).contains(&result.score.confidence));
    }

    #[tokio::test]
    async fn second_identical_message_is_served_from_cache() {
        let embedder = Arc::new(TestEmbedder::new(false));
        let (analyzer, cache) = analyzer(Arc::clone(&embedder));
        let request = RequestContext::new("u1", "r1");

        let first = analyzer.analyze("wagmi", &request).await.unwrap();
        wait_for_cache(&cache, "wagmi", "r1").await;
        let embeds = embedder.single_calls.load(Ordering::SeqCst);

        let second = analyzer
            .analyze("wagmi", &RequestContext::new("u2", "r2"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(embedder.single_calls.load(Ordering::SeqCst), embeds);
    }

    #[tokio::test]
    async fn strategy_can_be_swapped_at_runtime() {
        let (analyzer, _) = analyzer(Arc::new(TestEmbedder::new(false)));
        assert_eq!(analyzer.strategy_name(), "lexical");

        analyzer.set_strategy(Arc::new(FixedStrategy(-0.9)));
        let result = analyzer
            .analyze("anything at all", &RequestContext::new("u1", "r1"))
            .await
            .unwrap();

        assert_eq!(analyzer.strategy_name(), "fixed");
        assert_eq!(result.score.score, -0.9);
        assert_eq!(result.score.category, SentimentCategory::StronglyBearish);
    }

    #[tokio::test]
    async fn failing_observers_do_not_affect_others() {
        let (analyzer, _) = analyzer(Arc::new(TestEmbedder::new(false)));
        let seen = Arc::new(AtomicUsize::new(0));

        analyzer.add_observer(Arc::new(
            |_: &str, _: &SentimentAnalysisResult| -> anyhow::Result<()> {
                anyhow::bail!("observer broke")
            },
        ));
        analyzer.add_observer(Arc::new(
            |_: &str, _: &SentimentAnalysisResult| -> anyhow::Result<()> { panic!("boom") },
        ));
        let counter = Arc::clone(&seen);
        let id = analyzer.add_observer(Arc::new(
            move |_: &str, _: &SentimentAnalysisResult| -> anyhow::Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        ));

        let request = RequestContext::new("u1", "r1");
        analyzer.analyze("gm", &request).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert!(analyzer.remove_observer(id));
        assert!(!analyzer.remove_observer(id));
        analyzer.analyze("gn", &request).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn embedding_failure_surfaces_after_retries() {
        let (analyzer, _) = analyzer(Arc::new(TestEmbedder::new(false)));
        analyzer.initialize().await.unwrap();

        let broken = Arc::new(TestEmbedder::new(true));
        let analyzer = SentimentAnalyzer {
            embeddings: broken.clone(),
            ..analyzer
        };
        let err = analyzer
            .analyze("never embedded", &RequestContext::new("u1", "r1"))
            .await
            .expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert_eq!(broken.single_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cleanup_returns_to_uninitialized() {
        let (analyzer, _) = analyzer(Arc::new(TestEmbedder::new(false)));
        analyzer.initialize().await.unwrap();

        let purged = analyzer.cleanup().await.unwrap();

        assert_eq!(purged, 0);
        assert_eq!(analyzer.state(), ServiceState::Uninitialized);
        assert_eq!(analyzer.reference_embedding_count(), 0);
    }

    #[tokio::test]
    async fn vector_store_failure_surfaces_after_retries() {
        let store = Arc::new(TestStore {
            fail_query: true,
            ..TestStore::default()
        });
        let (analyzer, _) = analyzer_with(
            Arc::new(TestEmbedder::new(false)),
            store.clone(),
            Database::in_memory().unwrap(),
        );

        let err = analyzer
            .analyze("to the moon", &RequestContext::new("u1", "r1"))
            .await
            .expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::VectorStore);
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(store.queries.load(Ordering::SeqCst), 3);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn background_write_failures_never_reach_the_caller() {
        let store = Arc::new(TestStore {
            fail_upsert: true,
            ..TestStore::default()
        });
        let db = Database::in_memory().unwrap();
        let (analyzer, _) = analyzer_with(
            Arc::new(TestEmbedder::new(false)),
            store.clone(),
            db.clone(),
        );
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE sentiment_cache")?;
            Ok(())
        })
        .await
        .unwrap();
        let request = RequestContext::new("u1", "r1");

        let first = analyzer.analyze("wagmi", &request).await;
        assert!(first.is_ok());

        for _ in 0..200 {
            if store.upserts.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);

        // Cache lookups fail too; analysis still goes through.
        let second = analyzer.analyze("wagmi", &request).await.unwrap();
        assert_eq!(first.unwrap(), second);
    }

    #[tokio::test]
    async fn observers_run_in_registration_order() {
        let (analyzer, _) = analyzer(Arc::new(TestEmbedder::new(false)));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            analyzer.add_observer(Arc::new(
                move |_: &str, _: &SentimentAnalysisResult| -> anyhow::Result<()> {
                    order.lock().unwrap().push(name);
                    Ok(())
                },
            ));
        }

        analyzer
            .analyze("gm", &RequestContext::new("u1", "r1"))
            .await
            .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }
}
