use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::SentimentCategory;

pub type Metadata = HashMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorMatch {
    pub id: String,
    /// Similarity; higher is closer.
    pub score: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorMatch {
    pub fn category(&self) -> Option<SentimentCategory> {
        self.metadata
            .get("category")
            .and_then(Value::as_str)
            .and_then(SentimentCategory::parse)
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        self.metadata.get("timestamp").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}
