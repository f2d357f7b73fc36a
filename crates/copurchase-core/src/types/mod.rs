//! Core domain types: identities, registry entries, anchors, and scored
//! recommendations.

mod ids;
mod recommendation;

pub use ids::{BasketId, ItemId};
pub use recommendation::{RecommendationReason, ScoredRecommendation};

use serde::{Deserialize, Serialize};

/// A catalog item as known to the engine.
///
/// Identity is immutable; popularity is recomputed on every retrain and
/// counts the number of baskets the item appears in (not raw line
/// occurrences, so duplicate lines within one basket do not inflate it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Normalized item identity.
    pub id: ItemId,
    /// Number of baskets containing this item in the current generation.
    pub popularity: u64,
    /// Optional category tag, when the ingestion source supplies one.
    pub category: Option<String>,
}

impl Item {
    /// Create a registry entry.
    pub fn new(id: ItemId, popularity: u64) -> Self {
        Self {
            id,
            popularity,
            category: None,
        }
    }
}

/// The item or basket a recommendation request is relative to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// A single catalog item.
    Item(ItemId),
    /// A basket known from training data, referenced by id.
    Basket(BasketId),
    /// An ad-hoc set of items (an in-progress cart), never seen at
    /// training time as a basket.
    ItemSet(Vec<ItemId>),
}

impl Anchor {
    /// Canonical string form, stable across equivalent anchors.
    ///
    /// Used as the anchor component of cache keys; item sets are sorted so
    /// member order does not fragment the cache.
    pub fn cache_key(&self) -> String {
        match self {
            Anchor::Item(id) => format!("item:{id}"),
            Anchor::Basket(id) => format!("basket:{id}"),
            Anchor::ItemSet(items) => {
                let mut names: Vec<&str> = items.iter().map(ItemId::as_str).collect();
                names.sort_unstable();
                names.dedup();
                format!("set:{}", names.join(","))
            }
        }
    }
}
