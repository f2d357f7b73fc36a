//! Error types for copurchase-core.
//!
//! This module defines the error taxonomy of the recommendation engine:
//!
//! - [`CopurchaseError`]: top-level unified error for all crate errors
//! - Sub-error types: [`TrainingError`], [`EmbeddingError`], [`RecommendError`]
//!
//! Storage errors ([`copurchase_storage::StoreError`], including the
//! zero-vector `InvalidVector` case) convert into the unified type via
//! `From`.
//!
//! Malformed ingestion input is deliberately *not* an error type: skipped
//! rows are structured records in the
//! [`IngestReport`](crate::interaction::IngestReport) because a bad row must
//! never fail the batch.
//!
//! # Propagation policy
//!
//! - Library code never panics; errors propagate with `?`
//! - Per-request signal-source failures degrade to a missing signal and are
//!   logged, never surfaced to the caller
//! - Batch-job (ingest/train) errors are returned to the operator in full

mod sub_errors;
mod unified;

pub use sub_errors::{EmbeddingError, RecommendError, TrainingError};
pub use unified::{CopurchaseError, Result};
