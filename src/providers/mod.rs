//! Seams to the external embedding and vector-similarity services.
//!
//! Real deployments plug in HTTP clients behind these traits; the
//! [`memory`] module carries deterministic in-process versions.

pub mod memory;
pub mod types;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use memory::{HashingEmbedder, InMemoryVectorStore};
pub use types::{Metadata, VectorMatch, VectorQuery, VectorRecord};

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// One request for many texts. The default issues them one by one.
    async fn generate_batch_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.generate_embedding(text).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the backing index if it does not exist yet.
    async fn ensure_index(&self) -> Result<()>;

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>>;

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;
}

/// Embed `texts` in batches of at most `chunk_size`, preserving order and
/// checking each vector's dimension.
pub async fn embed_in_chunks(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    chunk_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let chunk_size = chunk_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(chunk_size) {
        let batch = provider.generate_batch_embeddings(chunk).await?;
        if batch.len() != chunk.len() {
            bail!(
                "embedding provider returned {} vectors for {} texts",
                batch.len(),
                chunk.len()
            );
        }
        for vector in &batch {
            check_dimension(vector, provider.dimension())?;
        }
        vectors.extend(batch);
    }

    Ok(vectors)
}

pub fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        bail!(
            "invalid embedding dimension: expected {}, got {}",
            expected,
            vector.len()
        );
    }
    Ok(())
}
