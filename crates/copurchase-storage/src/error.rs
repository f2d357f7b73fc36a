//! Error types for vector storage operations.

use thiserror::Error;

use crate::space::VectorSpace;

/// Errors from vector store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// No vector stored under this id in the given space.
    #[error("entity not found in {space}: {id}")]
    NotFound {
        /// Space that was queried
        space: VectorSpace,
        /// Entity id that was not present
        id: String,
    },

    /// Query vector is empty or has zero magnitude; cosine is undefined.
    ///
    /// Callers must handle this explicitly rather than receiving an
    /// arbitrary similarity score.
    #[error("invalid query vector: {reason}")]
    InvalidVector {
        /// Why the vector cannot be scored
        reason: &'static str,
    },

    /// Vector dimension does not match the space's established dimension.
    #[error("dimension mismatch in {space}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Space the vector was written to or queried against
        space: VectorSpace,
        /// Dimension already established for the space
        expected: usize,
        /// Dimension of the offending vector
        actual: usize,
    },
}

impl StoreError {
    /// Shorthand for the zero-magnitude query case.
    #[inline]
    pub fn zero_vector() -> Self {
        Self::InvalidVector {
            reason: "zero magnitude - cosine undefined",
        }
    }

    /// Shorthand for the empty query case.
    #[inline]
    pub fn empty_vector() -> Self {
        Self::InvalidVector {
            reason: "empty vector",
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
