//! Sentiment result types shared by the scoring engine, context aggregator,
//! cache and orchestrator.

use serde::{Deserialize, Serialize};

/// Five ordered sentiment bins, most bearish first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SentimentCategory {
    StronglyBearish,
    MildlyBearish,
    Neutral,
    MildlyBullish,
    StronglyBullish,
}

impl SentimentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentCategory::StronglyBearish => "strongly_bearish",
            SentimentCategory::MildlyBearish => "mildly_bearish",
            SentimentCategory::Neutral => "neutral",
            SentimentCategory::MildlyBullish => "mildly_bullish",
            SentimentCategory::StronglyBullish => "strongly_bullish",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "strongly_bearish" => Some(SentimentCategory::StronglyBearish),
            "mildly_bearish" => Some(SentimentCategory::MildlyBearish),
            "neutral" => Some(SentimentCategory::Neutral),
            "mildly_bullish" => Some(SentimentCategory::MildlyBullish),
            "strongly_bullish" => Some(SentimentCategory::StronglyBullish),
            _ => None,
        }
    }

    /// Map a score in `[-1, 1]` to its bin.
    pub fn from_score(score: f64) -> Self {
        if score <= -0.3 {
            SentimentCategory::StronglyBearish
        } else if score <= -0.15 {
            SentimentCategory::MildlyBearish
        } else if score <= 0.15 {
            SentimentCategory::Neutral
        } else if score <= 0.3 {
            SentimentCategory::MildlyBullish
        } else {
            SentimentCategory::StronglyBullish
        }
    }
}

impl Default for SentimentCategory {
    fn default() -> Self {
        SentimentCategory::Neutral
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentimentScore {
    /// In `[-1, 1]`.
    pub score: f64,
    pub category: SentimentCategory,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl SentimentScore {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            category: SentimentCategory::Neutral,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    /// Directional momentum in `[-1, 1]`.
    pub recent_trend: f64,
    /// Dispersion in `[0, 1]`.
    pub volatility: f64,
    pub dominant_category: SentimentCategory,
}

impl AnalysisContext {
    pub fn flat(category: SentimentCategory) -> Self {
        Self {
            recent_trend: 0.0,
            volatility: 0.0,
            dominant_category: category,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentimentAnalysisResult {
    pub score: SentimentScore,
    pub context: AnalysisContext,
}

/// Caller-supplied attribution persisted alongside a cache entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub user_id: String,
    pub room_id: String,
    pub sender_name: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            sender_name: None,
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}
