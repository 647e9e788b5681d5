use futures::future::join_all;
use serde::Serialize;

use crate::models::{
    MessageEntry, RequestContext, SentimentAnalysisResult, SentimentCategory, Window,
};

use super::orchestrator::SentimentAnalyzer;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Sentiment for every message of one window plus the window-level rollup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowAnalysis {
    pub window_id: String,
    pub chat_id: String,
    /// Successfully analyzed messages, in arrival order.
    pub results: Vec<(MessageEntry, SentimentAnalysisResult)>,
    pub failed: usize,
    /// Mean score over `results`; `0.0` when nothing succeeded.
    pub average_score: f64,
    pub category: SentimentCategory,
}

impl WindowAnalysis {
    pub fn message_count(&self) -> usize {
        self.results.len() + self.failed
    }
}

impl SentimentAnalyzer {
    /// Analyze every message of `window` concurrently.
    ///
    /// Individual failures are counted rather than failing the window.
    pub async fn analyze_window(&self, window: &Window) -> WindowAnalysis {
        let requests: Vec<RequestContext> = window
            .messages
            .iter()
            .map(|entry| request_for(window, entry))
            .collect();

        let outcomes = join_all(
            window
                .messages
                .iter()
                .zip(&requests)
                .map(|(entry, request)| self.analyze(&entry.text, request)),
        )
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failed = 0;
        for (entry, outcome) in window.messages.iter().zip(outcomes) {
            match outcome {
                Ok(result) => results.push((entry.clone(), result)),
                Err(err) => {
                    failed += 1;
                    log_warn!(
                        "Message from {} in window {} failed analysis ({}): {err}",
                        entry.user_id,
                        window.id,
                        err.severity().as_str()
                    );
                }
            }
        }

        let average_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|(_, r)| r.score.score).sum::<f64>() / results.len() as f64
        };

        log_debug!(
            "Window {} analyzed: {} ok, {} failed, mean {:.3}",
            window.id,
            results.len(),
            failed,
            average_score
        );

        WindowAnalysis {
            window_id: window.id.clone(),
            chat_id: window.chat_id.clone(),
            results,
            failed,
            average_score,
            category: SentimentCategory::from_score(average_score),
        }
    }
}

/// Messages carry an optional `senderName` in their platform metadata.
fn request_for(window: &Window, entry: &MessageEntry) -> RequestContext {
    let request = RequestContext::new(entry.user_id.clone(), window.chat_id.clone());
    match entry
        .platform_metadata
        .as_ref()
        .and_then(|meta| meta.get("senderName"))
        .and_then(|name| name.as_str())
    {
        Some(name) => request.with_sender_name(name),
        None => request,
    }
}
