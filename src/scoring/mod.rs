pub mod config;
pub mod emphasis;
pub mod engine;
mod lexicon;

pub use config::{EmojiClass, EmphasisConfig, Lexicon, Polarity};
pub use emphasis::EmphasisSignals;
pub use engine::LexicalScoringEngine;

use crate::models::SentimentScore;

/// Anything that can turn a message and its embedding into a score.
///
/// The orchestrator only depends on this trait, so the lexical engine can be
/// swapped for a learned model at runtime.
pub trait SentimentStrategy: Send + Sync {
    fn analyze(&self, text: &str, embedding: &[f32]) -> SentimentScore;

    fn name(&self) -> &str {
        "custom"
    }
}
