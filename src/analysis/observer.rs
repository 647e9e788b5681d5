use anyhow::Result;

use crate::models::SentimentAnalysisResult;

/// Notified synchronously after every successful analysis, cached or fresh.
///
/// A failing observer is logged and skipped; it never affects other
/// observers or the caller's result.
pub trait SentimentObserver: Send + Sync {
    fn on_analysis(&self, text: &str, result: &SentimentAnalysisResult) -> Result<()>;
}

impl<F> SentimentObserver for F
where
    F: Fn(&str, &SentimentAnalysisResult) -> Result<()> + Send + Sync,
{
    fn on_analysis(&self, text: &str, result: &SentimentAnalysisResult) -> Result<()> {
        self(text, result)
    }
}

/// Handle returned by `add_observer`, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);
