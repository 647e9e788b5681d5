use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::types::{VectorMatch, VectorQuery, VectorRecord};
use super::{EmbeddingProvider, VectorStore};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Deterministic feature-hashing embedder over character trigrams.
///
/// Texts sharing many trigrams land close together under cosine similarity,
/// which is enough for development and tests without a model server.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let padded: Vec<char> = format!("  {}  ", text.to_lowercase()).chars().collect();

        for gram in padded.windows(3) {
            let gram: String = gram.iter().collect();
            let digest = Sha256::digest(gram.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(super::DEFAULT_EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}

/// Brute-force cosine-similarity store. The index is created on first use.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    index: RwLock<Option<HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.as_ref().map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn index_exists(&self) -> bool {
        self.index.read().await.is_some()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_index(&self) -> Result<()> {
        let mut guard = self.index.write().await;
        if guard.is_none() {
            log_info!("Creating in-memory vector index");
            *guard = Some(HashMap::new());
        }
        Ok(())
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>> {
        self.ensure_index().await?;
        let guard = self.index.read().await;
        let Some(records) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .values()
            .filter(|record| record.values.len() == query.vector.len())
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: cosine_similarity(&query.vector, &record.values),
                metadata: if query.include_metadata {
                    record.metadata.clone()
                } else {
                    Default::default()
                },
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(query.top_k);
        Ok(matches)
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        self.ensure_index().await?;
        let mut guard = self.index.write().await;
        let Some(index) = guard.as_mut() else {
            bail!("vector index missing after creation");
        };
        for record in records {
            index.insert(record.id.clone(), record);
        }
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
