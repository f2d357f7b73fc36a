//! Top-level unified error type for the copurchase library.

use thiserror::Error;

use copurchase_storage::StoreError;

use super::sub_errors::{EmbeddingError, RecommendError, TrainingError};

/// Top-level unified error type.
///
/// All crate errors convert into this type via `From` implementations so
/// callers can match one enum at the façade boundary.
#[derive(Debug, Error)]
pub enum CopurchaseError {
    /// Factor-training error.
    #[error("training error: {0}")]
    Training(#[from] TrainingError),

    /// Semantic-embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector-store error, including the zero-vector `InvalidVector` case.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Request-path or administrative error.
    #[error("recommendation error: {0}")]
    Recommend(#[from] RecommendError),
}

impl CopurchaseError {
    /// Whether this error may succeed on retry without operator action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CopurchaseError::Recommend(RecommendError::RetrainInProgress)
                | CopurchaseError::Recommend(RecommendError::BackendTimeout { .. })
                | CopurchaseError::Embedding(EmbeddingError::Unavailable { .. })
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CopurchaseError>;
