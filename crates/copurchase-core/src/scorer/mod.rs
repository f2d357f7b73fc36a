//! Hybrid score combination.
//!
//! Pure functions combining independently produced signal-source candidate
//! lists into one ranked list: per-source max normalization, weighted sum,
//! consensus boost, similarity threshold, and a greedy single-pass
//! diversity penalty during top-N selection. Signal retrieval itself lives
//! in the engine; everything here is deterministic compute over already
//! fetched data, which is what makes the pipeline unit-testable.

mod config;

pub use config::WeightConfig;

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use copurchase_storage::similarity::cosine_similarity;

use crate::types::ItemId;

/// The independent signal sources feeding the hybrid scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Basket co-purchase counts.
    CoOccurrence,
    /// Latent-factor similarity.
    Factor,
    /// Semantic-embedding similarity.
    Semantic,
}

impl SignalKind {
    /// All signal kinds.
    pub const ALL: [SignalKind; 3] = [
        SignalKind::CoOccurrence,
        SignalKind::Factor,
        SignalKind::Semantic,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::CoOccurrence => "co_occurrence",
            SignalKind::Factor => "factor",
            SignalKind::Semantic => "semantic",
        }
    }
}

/// One source's candidate batch with raw (un-normalized) scores.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCandidates {
    /// Which source produced this batch.
    pub kind: SignalKind,
    /// Candidate items with the source's own raw scores.
    pub scored: Vec<(ItemId, f32)>,
}

impl SignalCandidates {
    /// Wrap a raw candidate batch.
    pub fn new(kind: SignalKind, scored: Vec<(ItemId, f32)>) -> Self {
        Self { kind, scored }
    }
}

/// A candidate after combination, before or after diversity selection.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedCandidate {
    /// The candidate item.
    pub item: ItemId,
    /// Combined (and later penalized) score.
    pub score: f32,
    /// Sources that independently surfaced this item.
    pub sources: Vec<SignalKind>,
}

/// Combine per-source candidate batches under `weights`.
///
/// Per batch, raw scores are normalized to [0, 1] by the batch's own
/// maximum so no source's scale dominates; only positive raw scores
/// contribute (a negative cosine is not evidence *for* an item, and must
/// not earn it a consensus boost). Items surfaced by no weighted source are
/// absent from the result. After the weighted sum, the consensus boost
/// `1 + (sources - 1) * consensus_boost` rewards independent agreement,
/// then candidates below `min_similarity` are dropped.
///
/// The result is ordered by descending score, ties by item id ascending.
pub fn combine(batches: &[SignalCandidates], weights: &WeightConfig) -> Vec<CombinedCandidate> {
    let mut accumulated: HashMap<ItemId, (f32, Vec<SignalKind>)> = HashMap::new();

    for batch in batches {
        let weight = weights.weight_for(batch.kind);
        if weight <= 0.0 {
            continue;
        }
        let max = batch
            .scored
            .iter()
            .map(|(_, s)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        if !(max > 0.0) || !max.is_finite() {
            continue;
        }
        for (item, raw) in &batch.scored {
            if *raw <= 0.0 {
                continue;
            }
            let normalized = (raw / max).min(1.0);
            let entry = accumulated
                .entry(item.clone())
                .or_insert_with(|| (0.0, Vec::new()));
            entry.0 += weight * normalized;
            if !entry.1.contains(&batch.kind) {
                entry.1.push(batch.kind);
            }
        }
    }

    let mut combined: Vec<CombinedCandidate> = accumulated
        .into_iter()
        .map(|(item, (score, sources))| {
            let boost = 1.0 + (sources.len().saturating_sub(1)) as f32 * weights.consensus_boost;
            CombinedCandidate {
                item,
                score: score * boost,
                sources,
            }
        })
        .filter(|c| c.score >= weights.min_similarity)
        .collect();

    sort_ranked(&mut combined);
    combined
}

/// Select the final top `n` with a greedy single-pass diversity penalty.
///
/// Iterates `ranked` in score order; a candidate whose factor vector has
/// cosine similarity above `diversity_ceiling` to any already-selected item
/// is penalized multiplicatively by `1 - diversity_penalty` (once), then
/// still takes its selection slot; there is no second re-ranking pass.
/// Candidates without a factor vector cannot be compared and pass through
/// unpenalized. The selected list is finally re-sorted by penalized score,
/// ties by item id.
pub fn select_diverse(
    ranked: Vec<CombinedCandidate>,
    n: usize,
    weights: &WeightConfig,
    factor_vectors: &HashMap<ItemId, Vec<f32>>,
) -> Vec<CombinedCandidate> {
    let mut selected: Vec<CombinedCandidate> = Vec::with_capacity(n.min(ranked.len()));

    for mut candidate in ranked {
        if selected.len() == n {
            break;
        }
        if weights.diversity_penalty > 0.0 {
            if let Some(vector) = factor_vectors.get(&candidate.item) {
                let near_duplicate = selected.iter().any(|picked| {
                    factor_vectors
                        .get(&picked.item)
                        .and_then(|pv| cosine_similarity(vector, pv).ok())
                        .is_some_and(|sim| sim > weights.diversity_ceiling)
                });
                if near_duplicate {
                    candidate.score *= 1.0 - weights.diversity_penalty;
                }
            }
        }
        selected.push(candidate);
    }

    sort_ranked(&mut selected);
    selected
}

fn sort_ranked(candidates: &mut [CombinedCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item.cmp(&b.item))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> ItemId {
        ItemId::new(name).unwrap()
    }

    fn batch(kind: SignalKind, scored: &[(&str, f32)]) -> SignalCandidates {
        SignalCandidates::new(
            kind,
            scored.iter().map(|(n, s)| (item(n), *s)).collect(),
        )
    }

    #[test]
    fn two_source_item_outranks_single_source_item_at_equal_raw_scores() {
        // y surfaced by factor alone, z by factor and semantic, equal raw
        // scores. The consensus boost must decide in z's favor.
        let weights = WeightConfig::default()
            .with_weights(0.0, 0.5, 0.5)
            .with_consensus_boost(0.1)
            .with_min_similarity(0.0);
        let combined = combine(
            &[
                batch(SignalKind::Factor, &[("y", 0.8), ("z", 0.8)]),
                batch(SignalKind::Semantic, &[("z", 0.8)]),
            ],
            &weights,
        );

        assert_eq!(combined[0].item, item("z"));
        assert_eq!(combined[0].sources.len(), 2);
        assert_eq!(combined[1].item, item("y"));
        assert!(combined[0].score > combined[1].score);
        // z: (0.5 + 0.5) * 1.1; y: 0.5 with no boost.
        assert!((combined[0].score - 1.1).abs() < 1e-6);
        assert!((combined[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn two_source_item_wins_even_against_a_higher_single_source_score() {
        let weights = WeightConfig::default()
            .with_weights(0.0, 0.5, 0.5)
            .with_consensus_boost(0.1)
            .with_min_similarity(0.0);
        let combined = combine(
            &[
                batch(SignalKind::Factor, &[("y", 0.9), ("z", 0.8)]),
                batch(SignalKind::Semantic, &[("z", 0.8)]),
            ],
            &weights,
        );
        assert_eq!(combined[0].item, item("z"));
    }

    #[test]
    fn zero_weights_produce_zero_candidates() {
        let weights = WeightConfig::default().with_weights(0.0, 0.0, 0.0);
        let combined = combine(
            &[
                batch(SignalKind::CoOccurrence, &[("a", 5.0)]),
                batch(SignalKind::Factor, &[("b", 0.9)]),
            ],
            &weights,
        );
        assert!(combined.is_empty());
    }

    #[test]
    fn normalization_is_per_source() {
        // Co-occurrence counts in the hundreds must not drown a 0..1
        // cosine source: both batch maxima normalize to 1.0.
        let weights = WeightConfig::default()
            .with_weights(1.0, 1.0, 0.0)
            .with_consensus_boost(0.0)
            .with_min_similarity(0.0);
        let combined = combine(
            &[
                batch(SignalKind::CoOccurrence, &[("a", 500.0), ("b", 250.0)]),
                batch(SignalKind::Factor, &[("b", 0.9), ("a", 0.45)]),
            ],
            &weights,
        );
        let score = |name: &str| {
            combined
                .iter()
                .find(|c| c.item == item(name))
                .unwrap()
                .score
        };
        assert!((score("a") - 1.5).abs() < 1e-6);
        assert!((score("b") - 1.5).abs() < 1e-6);
    }

    #[test]
    fn threshold_drops_weak_candidates() {
        let weights = WeightConfig::default()
            .with_weights(1.0, 0.0, 0.0)
            .with_min_similarity(0.5);
        let combined = combine(
            &[batch(SignalKind::CoOccurrence, &[("a", 10.0), ("b", 1.0)])],
            &weights,
        );
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].item, item("a"));
    }

    #[test]
    fn non_positive_raw_scores_never_contribute() {
        let weights = WeightConfig::default()
            .with_weights(0.0, 1.0, 1.0)
            .with_min_similarity(0.0);
        let combined = combine(
            &[
                batch(SignalKind::Factor, &[("a", 0.8), ("b", -0.4)]),
                batch(SignalKind::Semantic, &[("b", -0.9)]),
            ],
            &weights,
        );
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].item, item("a"));
    }

    #[test]
    fn exact_ties_order_by_item_id() {
        let weights = WeightConfig::default()
            .with_weights(1.0, 0.0, 0.0)
            .with_consensus_boost(0.0)
            .with_min_similarity(0.0);
        let combined = combine(
            &[batch(
                SignalKind::CoOccurrence,
                &[("zeta", 3.0), ("alpha", 3.0), ("mid", 3.0)],
            )],
            &weights,
        );
        let names: Vec<&str> = combined.iter().map(|c| c.item.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn diversity_penalty_demotes_near_duplicates_in_one_pass() {
        let weights = WeightConfig::default().with_diversity(0.5, 0.95);
        let ranked = vec![
            CombinedCandidate {
                item: item("a"),
                score: 1.0,
                sources: vec![SignalKind::Factor],
            },
            CombinedCandidate {
                item: item("b"),
                score: 0.9,
                sources: vec![SignalKind::Factor],
            },
            CombinedCandidate {
                item: item("c"),
                score: 0.85,
                sources: vec![SignalKind::Factor],
            },
        ];
        let mut vectors = HashMap::new();
        vectors.insert(item("a"), vec![1.0, 0.0]);
        vectors.insert(item("b"), vec![0.999, 0.01]); // near-duplicate of a
        vectors.insert(item("c"), vec![0.0, 1.0]);

        let selected = select_diverse(ranked, 3, &weights, &vectors);
        let names: Vec<&str> = selected.iter().map(|c| c.item.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
        assert!((selected[2].score - 0.45).abs() < 1e-6);
    }

    #[test]
    fn diversity_selection_respects_top_n() {
        let weights = WeightConfig::default();
        let ranked: Vec<CombinedCandidate> = (0..5)
            .map(|i| CombinedCandidate {
                item: item(&format!("i{i}")),
                score: 1.0 - i as f32 * 0.1,
                sources: vec![SignalKind::Factor],
            })
            .collect();
        let selected = select_diverse(ranked, 2, &weights, &HashMap::new());
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn candidates_without_factor_vectors_pass_through_unpenalized() {
        let weights = WeightConfig::default().with_diversity(0.9, 0.5);
        let ranked = vec![
            CombinedCandidate {
                item: item("a"),
                score: 1.0,
                sources: vec![SignalKind::Semantic],
            },
            CombinedCandidate {
                item: item("b"),
                score: 0.9,
                sources: vec![SignalKind::Semantic],
            },
        ];
        let selected = select_diverse(ranked, 2, &weights, &HashMap::new());
        assert!((selected[1].score - 0.9).abs() < 1e-6);
    }
}
