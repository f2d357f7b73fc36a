//! Vector space names and retrieval result types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named vector space held by a [`crate::VectorStore`].
///
/// One space per signal source. Factor vectors are keyed by item id and by
/// basket id in separate spaces so a wholesale swap of one never tears the
/// other mid-read; the semantic space is keyed by item id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSpace {
    /// Item latent factors from the factor trainer.
    FactorItem,
    /// Basket latent factors from the factor trainer.
    FactorBasket,
    /// Item semantic embeddings from the semantic embedder.
    Semantic,
}

impl VectorSpace {
    /// All spaces, in swap order during a retrain.
    pub const ALL: [VectorSpace; 3] = [
        VectorSpace::FactorItem,
        VectorSpace::FactorBasket,
        VectorSpace::Semantic,
    ];

    /// Stable string name, usable as a key prefix by persistent backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorSpace::FactorItem => "factor:item",
            VectorSpace::FactorBasket => "factor:basket",
            VectorSpace::Semantic => "semantic",
        }
    }
}

impl fmt::Display for VectorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Entity id of the neighbor.
    pub id: String,
    /// Cosine similarity to the query, in [-1.0, 1.0].
    pub similarity: f32,
}

impl Neighbor {
    /// Create a neighbor hit.
    #[inline]
    pub fn new(id: impl Into<String>, similarity: f32) -> Self {
        Self {
            id: id.into(),
            similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_names_are_stable() {
        assert_eq!(VectorSpace::FactorItem.as_str(), "factor:item");
        assert_eq!(VectorSpace::FactorBasket.as_str(), "factor:basket");
        assert_eq!(VectorSpace::Semantic.as_str(), "semantic");
    }

    #[test]
    fn all_spaces_are_distinct() {
        let names: std::collections::HashSet<_> =
            VectorSpace::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names.len(), VectorSpace::ALL.len());
    }
}
