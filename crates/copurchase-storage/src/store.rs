//! The [`VectorStore`] trait.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::space::{Neighbor, VectorSpace};

/// Storage contract for named vector spaces.
///
/// Implementations must support exact-key retrieval, brute-force or indexed
/// nearest-neighbor search under cosine similarity, and an atomic wholesale
/// replacement of a space's contents. The engine calls these methods under a
/// timeout and treats an elapsed timer as a miss, so implementations should
/// not retry internally.
///
/// # Determinism
///
/// `nearest` must order results by descending similarity and break exact
/// ties by entity id ascending, so repeated queries over identical contents
/// return identical lists.
///
/// # Implementation Notes
///
/// - All methods are async for I/O flexibility
/// - The trait requires `Send + Sync` for concurrent access
/// - Implementations should log skipped/degenerate entries via `tracing`
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a vector under `id` in `space`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidVector`] if the vector is empty
    /// - [`StoreError::DimensionMismatch`] if the space already holds
    ///   vectors of a different dimension
    async fn put(&self, space: VectorSpace, id: &str, vector: Vec<f32>) -> StoreResult<()>;

    /// Retrieve the vector stored under `id` in `space`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no vector is stored under `id`
    async fn get(&self, space: VectorSpace, id: &str) -> StoreResult<Vec<f32>>;

    /// Return up to `k` entities nearest to `query` under cosine similarity.
    ///
    /// Never returns more than `k` results. Entities whose stored vector has
    /// zero magnitude cannot be scored and are skipped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidVector`] if `query` is empty or zero-magnitude
    async fn nearest(
        &self,
        space: VectorSpace,
        query: &[f32],
        k: usize,
    ) -> StoreResult<Vec<Neighbor>>;

    /// Atomically replace the entire contents of `space` with `mapping`.
    ///
    /// Readers observe either the previous contents or the new contents in
    /// full, never a mix.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidVector`] if any vector in `mapping` is empty
    /// - [`StoreError::DimensionMismatch`] if `mapping` holds vectors of
    ///   differing dimensions
    async fn bulk_replace(
        &self,
        space: VectorSpace,
        mapping: HashMap<String, Vec<f32>>,
    ) -> StoreResult<()>;

    /// Number of vectors currently stored in `space`.
    async fn len(&self, space: VectorSpace) -> usize;

    /// Return up to `k` entities nearest to the vector stored under `id`,
    /// excluding `id` itself.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if `id` has no vector in `space`
    /// - [`StoreError::InvalidVector`] if the stored vector cannot be used
    ///   as a query (zero magnitude)
    async fn nearest_to(
        &self,
        space: VectorSpace,
        id: &str,
        k: usize,
    ) -> StoreResult<Vec<Neighbor>> {
        let query = self.get(space, id).await?;
        // Over-fetch by one so the self hit never displaces a real neighbor.
        let mut hits = self.nearest(space, &query, k.saturating_add(1)).await?;
        hits.retain(|n| n.id != id);
        hits.truncate(k);
        Ok(hits)
    }
}
