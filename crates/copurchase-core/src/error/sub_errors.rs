//! Sub-error types for copurchase-core.
//!
//! Each error type covers one domain of failures.

use thiserror::Error;

// ============================================================================
// TRAINING ERROR
// ============================================================================

/// Factor-training failures.
///
/// Training fails fast rather than producing silently-zero vectors; on any
/// training error the previously swapped-in factor snapshot stays live.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainingError {
    /// The interaction matrix has no baskets or no items to factorize.
    #[error("interaction matrix is empty: nothing to factorize")]
    EmptyMatrix,

    /// Factor configuration is unusable.
    #[error("invalid factor config: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration
        reason: String,
    },

    /// The objective went non-finite or a normal-equations solve collapsed.
    ///
    /// # Recovery
    ///
    /// Increase regularization or lower the rank; the previous factor set
    /// remains servable.
    #[error("training failed to converge (diverged at iteration {iteration})")]
    NonConvergence {
        /// Iteration at which divergence was detected (1-based)
        iteration: usize,
    },
}

// ============================================================================
// EMBEDDING ERROR
// ============================================================================

/// Semantic-embedder failures.
///
/// Always non-fatal to requests and retrains: an unavailable embedding
/// removes the affected item from the semantic space and scoring proceeds
/// with the remaining signal sources.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbeddingError {
    /// The embedder could not produce a vector for this item.
    #[error("embedding unavailable for {item}: {reason}")]
    Unavailable {
        /// Item the embedder failed on
        item: String,
        /// Backend-reported reason
        reason: String,
    },

    /// The embedder returned a vector of unexpected dimension.
    #[error("embedding dimension mismatch for {item}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Item the embedder produced the vector for
        item: String,
        /// Dimension promised by the embedder
        expected: usize,
        /// Dimension actually returned
        actual: usize,
    },
}

// ============================================================================
// RECOMMEND ERROR
// ============================================================================

/// Request-path and administrative failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    /// Request failed validation before any work was done.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What failed validation
        reason: String,
    },

    /// The anchor item or basket was not present in the training data.
    ///
    /// Internal control-flow signal: the façade answers with the popularity
    /// fallback, the caller never sees this.
    #[error("anchor not found in training data: {anchor}")]
    AnchorNotFound {
        /// Canonical anchor key
        anchor: String,
    },

    /// A retrain was triggered while another was in flight.
    ///
    /// Duplicate triggers are rejected, not queued; the prior factor
    /// snapshot remains servable throughout the running retrain.
    #[error("retrain already in progress")]
    RetrainInProgress,

    /// A vector-store or cache call exceeded its deadline.
    ///
    /// Treated as a cache miss / fallback trigger, logged, and only
    /// surfaced if the fallback is unavailable too.
    #[error("backend timeout during {operation}")]
    BackendTimeout {
        /// The operation that timed out
        operation: &'static str,
    },

    /// Proposed weight configuration is unusable.
    #[error("invalid weight config: {reason}")]
    InvalidWeights {
        /// What failed validation
        reason: String,
    },

    /// Every signal source and the popularity fallback were unavailable.
    #[error("no recommendations available")]
    NoRecommendationsAvailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_error_messages_are_actionable() {
        let err = TrainingError::NonConvergence { iteration: 4 };
        assert!(err.to_string().contains("iteration 4"));
    }

    #[test]
    fn embedding_unavailable_names_the_item() {
        let err = EmbeddingError::Unavailable {
            item: "widget".into(),
            reason: "backend offline".into(),
        };
        assert!(err.to_string().contains("widget"));
        assert!(err.to_string().contains("backend offline"));
    }

    #[test]
    fn retrain_in_progress_is_comparable() {
        assert_eq!(
            RecommendError::RetrainInProgress,
            RecommendError::RetrainInProgress
        );
    }
}
