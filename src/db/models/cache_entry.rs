//! Persisted analysis keyed by the SHA-256 of the message body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AnalysisContext, SentimentAnalysisResult, SentimentCategory, SentimentScore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub message_hash: String,
    pub embedding: Vec<f32>,
    pub sentiment: f64,
    pub category: SentimentCategory,
    pub confidence: f64,
    pub context: AnalysisContext,
    pub user_id: String,
    pub room_id: String,
    pub sender_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn to_result(&self) -> SentimentAnalysisResult {
        SentimentAnalysisResult {
            score: SentimentScore {
                score: self.sentiment,
                category: self.category,
                confidence: self.confidence,
            },
            context: self.context,
        }
    }
}
