//! Weight configuration for hybrid score combination.

use serde::{Deserialize, Serialize};

use super::SignalKind;
use crate::error::RecommendError;

/// Versioned weights and knobs for one scoring pass.
///
/// An explicit value passed into every scoring call, never ambient mutable
/// state. The engine swaps whole instances atomically, so readers always
/// see a consistent set; `version` must strictly increase across swaps.
///
/// # Example
///
/// ```
/// use copurchase_core::scorer::WeightConfig;
///
/// let weights = WeightConfig::default()
///     .with_weights(0.5, 0.5, 0.0)
///     .with_consensus_boost(0.1);
/// assert!(weights.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Monotonically increasing configuration version.
    pub version: u64,
    /// Weight of the co-occurrence signal.
    pub co_occurrence: f32,
    /// Weight of the latent-factor signal.
    pub factor: f32,
    /// Weight of the semantic-embedding signal.
    pub semantic: f32,
    /// Per-extra-source multiplier: a candidate surfaced by `n` sources is
    /// scaled by `1 + (n - 1) * consensus_boost`.
    pub consensus_boost: f32,
    /// Candidates scoring below this after the boost are dropped.
    pub min_similarity: f32,
    /// Multiplicative reduction applied to a candidate too similar to an
    /// already-selected one: `score * (1 - diversity_penalty)`.
    pub diversity_penalty: f32,
    /// Factor-space cosine similarity above which two items count as
    /// near-duplicates for the diversity penalty.
    pub diversity_ceiling: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            version: 1,
            co_occurrence: 1.0,
            factor: 1.0,
            semantic: 1.0,
            consensus_boost: 0.1,
            min_similarity: 0.05,
            diversity_penalty: 0.25,
            diversity_ceiling: 0.95,
        }
    }
}

impl WeightConfig {
    /// Set the three signal weights at once.
    #[inline]
    pub fn with_weights(mut self, co_occurrence: f32, factor: f32, semantic: f32) -> Self {
        self.co_occurrence = co_occurrence;
        self.factor = factor;
        self.semantic = semantic;
        self
    }

    /// Set the consensus boost factor.
    #[inline]
    pub fn with_consensus_boost(mut self, boost: f32) -> Self {
        self.consensus_boost = boost;
        self
    }

    /// Set the minimum similarity threshold.
    #[inline]
    pub fn with_min_similarity(mut self, threshold: f32) -> Self {
        self.min_similarity = threshold;
        self
    }

    /// Set the diversity penalty coefficient and ceiling.
    #[inline]
    pub fn with_diversity(mut self, penalty: f32, ceiling: f32) -> Self {
        self.diversity_penalty = penalty;
        self.diversity_ceiling = ceiling;
        self
    }

    /// Set the configuration version.
    #[inline]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Weight assigned to a signal source.
    #[inline]
    pub fn weight_for(&self, kind: SignalKind) -> f32 {
        match kind {
            SignalKind::CoOccurrence => self.co_occurrence,
            SignalKind::Factor => self.factor,
            SignalKind::Semantic => self.semantic,
        }
    }

    /// True when no signal source carries weight.
    pub fn all_zero(&self) -> bool {
        SignalKind::ALL.iter().all(|k| self.weight_for(*k) <= 0.0)
    }

    /// Validate ranges before accepting a hot-swap.
    pub fn validate(&self) -> Result<(), RecommendError> {
        let named = [
            ("co_occurrence", self.co_occurrence),
            ("factor", self.factor),
            ("semantic", self.semantic),
            ("consensus_boost", self.consensus_boost),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(RecommendError::InvalidWeights {
                    reason: format!("{name} must be finite and non-negative, got {value}"),
                });
            }
        }
        if !self.min_similarity.is_finite() {
            return Err(RecommendError::InvalidWeights {
                reason: "min_similarity must be finite".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.diversity_penalty) {
            return Err(RecommendError::InvalidWeights {
                reason: format!(
                    "diversity_penalty must be within [0, 1], got {}",
                    self.diversity_penalty
                ),
            });
        }
        if !(-1.0..=1.0).contains(&self.diversity_ceiling) {
            return Err(RecommendError::InvalidWeights {
                reason: format!(
                    "diversity_ceiling must be within [-1, 1], got {}",
                    self.diversity_ceiling
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(WeightConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let config = WeightConfig::default().with_weights(-0.1, 1.0, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_diversity_penalty_is_rejected() {
        let config = WeightConfig::default().with_diversity(1.5, 0.9);
        assert!(config.validate().is_err());
    }

    #[test]
    fn all_zero_detects_disabled_scoring() {
        let config = WeightConfig::default().with_weights(0.0, 0.0, 0.0);
        assert!(config.all_zero());
        assert!(!WeightConfig::default().all_zero());
    }

    #[test]
    fn weight_for_maps_each_kind() {
        let config = WeightConfig::default().with_weights(0.2, 0.3, 0.4);
        assert_eq!(config.weight_for(SignalKind::CoOccurrence), 0.2);
        assert_eq!(config.weight_for(SignalKind::Factor), 0.3);
        assert_eq!(config.weight_for(SignalKind::Semantic), 0.4);
    }
}
