//! Semantic embedder seam.
//!
//! The engine treats semantic embedding as a black box producing one
//! fixed-dimension vector per item. Real deployments plug a model-backed
//! implementation in behind [`SemanticEmbedder`]; failures degrade the
//! semantic signal for the affected items instead of failing requests or
//! retrains.

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::types::ItemId;

/// Produces a fixed-dimension semantic vector per item.
#[async_trait]
pub trait SemanticEmbedder: Send + Sync {
    /// Dimension of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Embed a single item.
    ///
    /// # Errors
    ///
    /// [`EmbeddingError::Unavailable`] when the backend cannot produce a
    /// vector for this item; callers degrade, they do not fail.
    async fn embed(&self, item: &ItemId) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed many items, returning per-item outcomes.
    ///
    /// The default implementation calls [`embed`](Self::embed) per item;
    /// batch-capable backends should override it.
    async fn embed_batch(
        &self,
        items: &[ItemId],
    ) -> Vec<(ItemId, Result<Vec<f32>, EmbeddingError>)> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push((item.clone(), self.embed(item).await));
        }
        out
    }
}

/// Deterministic hash-based embedder.
///
/// Stands in for a model-backed embedder in tests and the CLI demo: the
/// same item name always maps to the same unit-length vector, distinct
/// names are spread pseudo-randomly. It carries no semantics beyond
/// identity, which is exactly what deterministic tests need.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

/// Default dimension of [`HashEmbedder`] vectors.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

impl HashEmbedder {
    /// Embedder with the default dimension.
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_EMBEDDING_DIMENSIONS)
    }

    /// Embedder with an explicit dimension (minimum 1).
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn component(item: &ItemId, dimension: usize) -> f32 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        (item.as_str(), dimension).hash(&mut hasher);
        let raw = hasher.finish();
        // Map the full u64 range onto [-1, 1].
        ((raw as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticEmbedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, item: &ItemId) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|d| Self::component(item, d))
            .collect();
        copurchase_storage::similarity::normalize(&mut vector);
        Ok(vector)
    }
}
