//! Scored recommendation results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::ItemId;
use crate::scorer::SignalKind;

/// Why an item was recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    /// Surfaced by basket co-purchase counts alone.
    CoOccurrence,
    /// Surfaced by latent-factor similarity alone.
    Factor,
    /// Surfaced by semantic-embedding similarity alone.
    Semantic,
    /// Independently surfaced by more than one signal source.
    Hybrid {
        /// Number of contributing sources.
        sources: usize,
    },
    /// Filled in from the popularity ranking (fallback path).
    Popularity,
}

impl RecommendationReason {
    /// Build a reason from the set of contributing signal sources.
    pub fn from_sources(sources: &[SignalKind]) -> Self {
        match sources {
            [SignalKind::CoOccurrence] => Self::CoOccurrence,
            [SignalKind::Factor] => Self::Factor,
            [SignalKind::Semantic] => Self::Semantic,
            _ => Self::Hybrid {
                sources: sources.len(),
            },
        }
    }
}

impl fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoOccurrence => f.write_str("co-occurrence"),
            Self::Factor => f.write_str("factor"),
            Self::Semantic => f.write_str("semantic"),
            Self::Hybrid { sources } => write!(f, "hybrid ({sources} sources)"),
            Self::Popularity => f.write_str("popularity"),
        }
    }
}

/// One entry of a recommendation result list.
///
/// Ephemeral: computed per request and persisted only in the TTL-bounded
/// result cache. Scores live conceptually in [0, 1] but are not clamped;
/// the consensus boost can push a strong multi-source item slightly above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecommendation {
    /// The recommended item.
    pub item: ItemId,
    /// Final combined score after boost and diversity penalty.
    pub score: f32,
    /// Which signal path produced this entry.
    pub reason: RecommendationReason,
    /// 1-based rank in the popularity ordering, set on fallback entries.
    pub popularity_rank: Option<usize>,
}

impl ScoredRecommendation {
    /// Create an entry without a popularity rank.
    pub fn new(item: ItemId, score: f32, reason: RecommendationReason) -> Self {
        Self {
            item,
            score,
            reason,
            popularity_rank: None,
        }
    }
}
