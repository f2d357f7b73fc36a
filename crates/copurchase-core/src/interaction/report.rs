//! Structured ingestion reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InteractionMatrix, RawPair};
use crate::types::BasketId;

/// Machine-readable reason a raw pair was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Basket id was empty after trimming.
    MissingBasketId,
    /// Item name was empty after normalization.
    MissingItemName,
}

/// One skipped row: position, reason, and the offending raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    /// 1-based position in the input stream.
    pub line: usize,
    /// Why the row was rejected.
    pub reason: SkipReason,
    /// Raw basket field as received.
    pub basket: String,
    /// Raw item field as received.
    pub item: String,
}

/// One deterministic basket truncation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncatedBasket {
    /// The affected basket.
    pub basket: BasketId,
    /// Members kept (equals the configured cap).
    pub kept: usize,
    /// Distinct members dropped beyond the cap.
    pub dropped: usize,
}

/// Batch-level audit record of one ingestion run.
///
/// Returned alongside the matrix so the operator sees exactly what was
/// read, kept, skipped, and truncated. Nothing here is logged-and-lost;
/// the report is the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Total raw rows consumed from the stream.
    pub pairs_read: usize,
    /// Well-formed rows (including duplicates that collapsed).
    pub pairs_kept: usize,
    /// Skipped rows with reasons.
    pub skipped: Vec<SkippedPair>,
    /// Baskets truncated by the size cap.
    pub truncated_baskets: Vec<TruncatedBasket>,
    /// Distinct baskets ingested.
    pub basket_count: usize,
    /// Distinct items ingested.
    pub item_count: usize,
    /// Mean distinct basket size after truncation.
    pub mean_basket_size: f64,
    /// Largest distinct basket size after truncation.
    pub max_basket_size: usize,
    /// Ingestion start, UTC.
    pub started_at: DateTime<Utc>,
    /// Ingestion end, UTC.
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    pub(super) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            pairs_read: 0,
            pairs_kept: 0,
            skipped: Vec::new(),
            truncated_baskets: Vec::new(),
            basket_count: 0,
            item_count: 0,
            mean_basket_size: 0.0,
            max_basket_size: 0,
            started_at,
            finished_at: started_at,
        }
    }

    /// Number of skipped rows.
    pub fn pairs_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub(super) fn skip(&mut self, line: usize, reason: SkipReason, pair: &RawPair) {
        self.skipped.push(SkippedPair {
            line,
            reason,
            basket: pair.basket.clone(),
            item: pair.item.clone(),
        });
    }

    pub(super) fn truncate(&mut self, basket: BasketId, kept: usize, dropped: usize) {
        self.truncated_baskets.push(TruncatedBasket {
            basket,
            kept,
            dropped,
        });
    }

    pub(super) fn finish(&mut self, matrix: &InteractionMatrix, finished_at: DateTime<Utc>) {
        self.basket_count = matrix.basket_count();
        self.item_count = matrix.item_count();
        self.max_basket_size = matrix
            .baskets()
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        self.mean_basket_size = if matrix.basket_count() > 0 {
            matrix.nonzeros() as f64 / matrix.basket_count() as f64
        } else {
            0.0
        };
        self.finished_at = finished_at;
        // Sorted views keep the report stable across hash orders.
        self.truncated_baskets
            .sort_unstable_by(|a, b| a.basket.cmp(&b.basket));
    }
}
