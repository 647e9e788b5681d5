use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use tokio::sync::mpsc;

use crate::analysis::{SentimentAnalyzer, WindowAnalysis};
use crate::cache::SentimentCache;
use crate::db::Database;
use crate::models::{MessageInput, RequestContext, SentimentAnalysisResult, Window};
use crate::providers::{EmbeddingProvider, VectorStore};
use crate::recovery::AnalysisError;
use crate::settings::{Settings, SettingsStore};
use crate::windowing::{WindowController, WindowHandler};

/// Finished window analyses buffered before the sweep blocks on the receiver.
const ANALYSIS_CHANNEL_CAPACITY: usize = 16;

/// Messages in, window-level sentiment out.
pub struct SentimentPipeline {
    analyzer: Arc<SentimentAnalyzer>,
    windows: WindowController,
}

impl SentimentPipeline {
    /// Wire a pipeline from settings. The cache lives in SQLite at
    /// `settings.cache.db_path`, or in memory when unset.
    pub fn open(
        settings: &Settings,
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let db = match &settings.cache.db_path {
            Some(path) => Database::new(path.clone())?,
            None => Database::in_memory()?,
        };
        let lexicon = settings.load_lexicon().context("failed to load lexicon")?;
        info!("Loaded lexicon with {} anchor terms", lexicon.len());

        let cache = SentimentCache::new(db, &settings.cache);
        let analyzer = SentimentAnalyzer::new(
            embeddings,
            vectors,
            cache,
            lexicon,
            settings.analysis.clone(),
        );

        Ok(Self::from_parts(Arc::new(analyzer), settings))
    }

    /// Like [`open`](Self::open), reading settings from a JSON file (missing
    /// file means defaults) with `CHATPULSE_*` overrides applied.
    pub fn open_with_settings_file(
        path: PathBuf,
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let store = SettingsStore::new(path)?;
        Self::open(&store.settings(), embeddings, vectors)
    }

    pub fn from_parts(analyzer: Arc<SentimentAnalyzer>, settings: &Settings) -> Self {
        Self {
            analyzer,
            windows: WindowController::new(settings.window.clone()),
        }
    }

    pub fn analyzer(&self) -> &Arc<SentimentAnalyzer> {
        &self.analyzer
    }

    pub fn windows(&self) -> &WindowController {
        &self.windows
    }

    pub async fn initialize(&self) -> Result<(), AnalysisError> {
        self.analyzer.initialize().await
    }

    pub async fn add_message(&self, input: MessageInput) -> Window {
        self.windows.add_message(input).await
    }

    pub async fn analyze_sentiment(
        &self,
        text: &str,
        request: &RequestContext,
    ) -> Result<SentimentAnalysisResult, AnalysisError> {
        self.analyzer.analyze(text, request).await
    }

    /// Start sweeping windows and return the stream of their analyses.
    ///
    /// If processing is already running the existing handler stays in place
    /// and the returned receiver is already closed: `recv()` yields `None`.
    pub async fn start(&self) -> mpsc::Receiver<WindowAnalysis> {
        let (tx, rx) = mpsc::channel(ANALYSIS_CHANNEL_CAPACITY);
        let handler = SentimentWindowHandler {
            analyzer: Arc::clone(&self.analyzer),
            tx,
        };
        self.windows.start_processing(Arc::new(handler)).await;
        rx
    }

    /// Start sweeping with a caller-supplied handler instead.
    pub async fn start_with_handler(&self, handler: Arc<dyn WindowHandler>) {
        self.windows.start_processing(handler).await;
    }

    pub async fn stop(&self) -> Result<()> {
        self.windows.stop_processing().await
    }

    /// Sweep finished and stale windows, then reset the analyzer. Returns the
    /// number of expired cache entries purged.
    pub async fn cleanup(&self) -> Result<usize, AnalysisError> {
        self.windows.manager().lock().await.cleanup(Utc::now());
        self.analyzer.cleanup().await
    }
}

struct SentimentWindowHandler {
    analyzer: Arc<SentimentAnalyzer>,
    tx: mpsc::Sender<WindowAnalysis>,
}

#[async_trait]
impl WindowHandler for SentimentWindowHandler {
    async fn handle_window(&self, window: Window) -> Result<()> {
        let analysis = self.analyzer.analyze_window(&window).await;
        self.tx
            .send(analysis)
            .await
            .context("window analysis receiver dropped")
    }
}
