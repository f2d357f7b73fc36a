//! In-memory [`VectorStore`] backend.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::similarity::{cosine_similarity, l2_norm};
use crate::space::{Neighbor, VectorSpace};
use crate::store::VectorStore;

/// In-memory vector store backed by per-space hash maps.
///
/// Nearest-neighbor retrieval is a brute-force cosine scan, which is exact
/// and deterministic; corpora here are item catalogs, not web-scale
/// collections, so a scan is the honest baseline. Each space is guarded by
/// its own lock so a bulk replace of one space never blocks reads of
/// another.
///
/// # Thread Safety
///
/// `Send + Sync`; all interior mutability goes through `parking_lot`
/// read-write locks held only for the duration of a single operation.
pub struct InMemoryVectorStore {
    spaces: HashMap<VectorSpace, RwLock<SpaceContents>>,
}

#[derive(Default)]
struct SpaceContents {
    dimension: Option<usize>,
    vectors: HashMap<String, Vec<f32>>,
}

impl InMemoryVectorStore {
    /// Create an empty store with all known spaces present.
    pub fn new() -> Self {
        let spaces = VectorSpace::ALL
            .iter()
            .map(|s| (*s, RwLock::new(SpaceContents::default())))
            .collect();
        Self { spaces }
    }

    fn space(&self, space: VectorSpace) -> &RwLock<SpaceContents> {
        // Every variant is inserted in `new`; the map is never mutated after.
        &self.spaces[&space]
    }

    fn check_dimension(
        space: VectorSpace,
        established: Option<usize>,
        vector: &[f32],
    ) -> StoreResult<()> {
        if vector.is_empty() {
            return Err(StoreError::empty_vector());
        }
        if let Some(expected) = established {
            if vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    space,
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn put(&self, space: VectorSpace, id: &str, vector: Vec<f32>) -> StoreResult<()> {
        let mut contents = self.space(space).write();
        Self::check_dimension(space, contents.dimension, &vector)?;
        contents.dimension.get_or_insert(vector.len());
        contents.vectors.insert(id.to_owned(), vector);
        Ok(())
    }

    async fn get(&self, space: VectorSpace, id: &str) -> StoreResult<Vec<f32>> {
        let contents = self.space(space).read();
        contents
            .vectors
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                space,
                id: id.to_owned(),
            })
    }

    async fn nearest(
        &self,
        space: VectorSpace,
        query: &[f32],
        k: usize,
    ) -> StoreResult<Vec<Neighbor>> {
        if query.is_empty() {
            return Err(StoreError::empty_vector());
        }
        if l2_norm(query) < f32::EPSILON {
            return Err(StoreError::zero_vector());
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let contents = self.space(space).read();
        let mut skipped = 0usize;
        let mut hits: Vec<Neighbor> = contents
            .vectors
            .iter()
            .filter_map(|(id, v)| match cosine_similarity(query, v) {
                Ok(sim) => Some(Neighbor::new(id.clone(), sim)),
                Err(_) => {
                    // Zero-magnitude or mismatched stored vector: unscorable.
                    skipped += 1;
                    None
                }
            })
            .collect();
        drop(contents);

        if skipped > 0 {
            debug!(space = %space, skipped, "skipped unscorable vectors during nearest scan");
        }

        // Descending similarity, ties by entity id ascending.
        hits.sort_unstable_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn bulk_replace(
        &self,
        space: VectorSpace,
        mapping: HashMap<String, Vec<f32>>,
    ) -> StoreResult<()> {
        let mut dimension = None;
        for vector in mapping.values() {
            Self::check_dimension(space, dimension, vector)?;
            dimension.get_or_insert(vector.len());
        }

        let count = mapping.len();
        let mut contents = self.space(space).write();
        contents.dimension = dimension;
        contents.vectors = mapping;
        drop(contents);

        debug!(space = %space, count, "replaced vector space contents");
        Ok(())
    }

    async fn len(&self, space: VectorSpace) -> usize {
        self.space(space).read().vectors.len()
    }
}
