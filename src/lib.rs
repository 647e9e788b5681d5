//! Windowed sentiment analysis for live chat streams.
//!
//! Messages are buffered per chat into fixed-duration windows; a background
//! sweep hands ready windows to the analyzer, which scores each message
//! against a weighted lexicon, enriches it with trend and volatility from
//! similar past messages, and caches the result by content hash.
//!
//! ```ignore
//! use std::sync::Arc;
//! use chatpulse::{providers, MessageInput, SentimentPipeline, Settings};
//!
//! let pipeline = SentimentPipeline::open(
//!     &Settings::default(),
//!     Arc::new(providers::HashingEmbedder::default()),
//!     Arc::new(providers::InMemoryVectorStore::new()),
//! )?;
//! let mut analyses = pipeline.start().await;
//! pipeline.add_message(MessageInput::new("room", "alice", "to the moon 🚀")).await;
//! ```

pub mod utils;

pub mod analysis;
pub mod cache;
pub mod context;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod recovery;
pub mod scoring;
pub mod settings;
pub mod windowing;

pub use analysis::{ObserverId, SentimentAnalyzer, SentimentObserver, ServiceState, WindowAnalysis};
pub use models::{
    AnalysisContext, MessageEntry, MessageInput, RequestContext, SentimentAnalysisResult,
    SentimentCategory, SentimentScore, Window, WindowStatus,
};
pub use pipeline::SentimentPipeline;
pub use recovery::{AnalysisError, ErrorKind, Severity};
pub use scoring::{LexicalScoringEngine, Lexicon, SentimentStrategy};
pub use settings::{Settings, SettingsStore};
pub use utils::init_logging;
pub use windowing::WindowHandler;
