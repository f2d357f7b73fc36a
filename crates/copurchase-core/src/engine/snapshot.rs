//! Immutable per-generation view of everything a request reads.

use std::collections::HashMap;
use std::sync::Arc;

use copurchase_storage::{InMemoryVectorStore, VectorStore};

use crate::interaction::{CoOccurrenceTable, InteractionMatrix};
use crate::types::{BasketId, Item, ItemId};

/// One atomically-swapped generation: item registry, basket memberships,
/// co-occurrence table, popularity ranking, and the vector spaces trained
/// for this generation.
///
/// A request clones the `Arc<Snapshot>` once and reads only through it, so
/// it observes either the fully-old or the fully-new generation: the
/// vector store instance belongs to the snapshot and is never mutated after
/// the swap.
pub struct Snapshot {
    generation: u64,
    items: HashMap<ItemId, Item>,
    baskets: HashMap<BasketId, Vec<ItemId>>,
    cooccurrence: CoOccurrenceTable,
    popularity_ranked: Vec<(ItemId, u64)>,
    max_popularity: u64,
    vectors: Arc<dyn VectorStore>,
}

impl Snapshot {
    /// The pre-training generation: empty registry, empty spaces.
    pub(crate) fn empty() -> Self {
        Self {
            generation: 0,
            items: HashMap::new(),
            baskets: HashMap::new(),
            cooccurrence: CoOccurrenceTable::default(),
            popularity_ranked: Vec::new(),
            max_popularity: 0,
            vectors: Arc::new(InMemoryVectorStore::new()),
        }
    }

    /// Assemble a generation from a freshly built matrix and its populated
    /// vector store.
    pub(crate) fn from_matrix(
        generation: u64,
        matrix: InteractionMatrix,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        let (baskets, cooccurrence, popularity) = matrix.into_parts();

        let items: HashMap<ItemId, Item> = popularity
            .iter()
            .map(|(id, count)| (id.clone(), Item::new(id.clone(), *count)))
            .collect();

        let mut popularity_ranked: Vec<(ItemId, u64)> = popularity.into_iter().collect();
        popularity_ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let max_popularity = popularity_ranked.first().map(|(_, c)| *c).unwrap_or(0);

        Self {
            generation,
            items,
            baskets,
            cooccurrence,
            popularity_ranked,
            max_popularity,
            vectors,
        }
    }

    /// Generation counter; bumps by one per successful retrain.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The item registry of this generation.
    pub fn items(&self) -> &HashMap<ItemId, Item> {
        &self.items
    }

    /// Distinct members of a trained basket, in first-occurrence order.
    pub fn basket_items(&self, basket: &BasketId) -> Option<&[ItemId]> {
        self.baskets.get(basket).map(Vec::as_slice)
    }

    /// The co-occurrence table of this generation.
    pub fn cooccurrence(&self) -> &CoOccurrenceTable {
        &self.cooccurrence
    }

    /// Items ordered by descending popularity, ties by id ascending.
    pub fn popularity_ranked(&self) -> &[(ItemId, u64)] {
        &self.popularity_ranked
    }

    /// Highest basket-membership count in this generation.
    pub fn max_popularity(&self) -> u64 {
        self.max_popularity
    }

    /// 1-based position of `item` in the popularity ordering.
    pub fn popularity_rank(&self, item: &ItemId) -> Option<usize> {
        self.popularity_ranked
            .iter()
            .position(|(id, _)| id == item)
            .map(|p| p + 1)
    }

    /// The vector spaces trained for this generation.
    pub fn vectors(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    /// True when the registry holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
