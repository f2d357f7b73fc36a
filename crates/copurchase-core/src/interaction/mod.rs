//! Interaction matrix construction from raw basket/item pairs.
//!
//! Converts an unsorted, undeduplicated stream of `(basket, item)` pairs
//! into the three structures everything downstream consumes:
//!
//! - sparse basket → item memberships (ordered, distinct),
//! - a symmetric item × item co-occurrence table,
//! - per-item popularity (basket-membership counts).
//!
//! Malformed rows are skipped with a machine-readable reason and surface in
//! the [`IngestReport`]; silent loss is a defect. Oversized baskets are
//! truncated deterministically (first N distinct items in input order) to
//! bound the quadratic co-occurrence term, and every truncation is reported.

mod report;

pub use report::{IngestReport, SkipReason, SkippedPair, TruncatedBasket};

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info};

use crate::types::{BasketId, ItemId};

/// Default cap on basket size before deterministic truncation.
pub const DEFAULT_BASKET_CAP: usize = 50;

/// One raw ingestion row, prior to any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPair {
    /// Raw basket (order) identifier.
    pub basket: String,
    /// Raw item name.
    pub item: String,
}

impl RawPair {
    /// Convenience constructor for tests and adapters.
    pub fn new(basket: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            basket: basket.into(),
            item: item.into(),
        }
    }
}

/// Symmetric item × item co-occurrence counts.
///
/// Stored as an adjacency map in both directions; self-pairs are never
/// recorded. Counts are basket-level: two items co-occurring in one basket
/// contribute exactly one, however many duplicate lines the basket had.
#[derive(Debug, Clone, Default)]
pub struct CoOccurrenceTable {
    adjacency: HashMap<ItemId, HashMap<ItemId, u64>>,
}

impl CoOccurrenceTable {
    /// Number of baskets in which both `a` and `b` appear. Zero for the
    /// self-pair, which is excluded by construction.
    pub fn count(&self, a: &ItemId, b: &ItemId) -> u64 {
        if a == b {
            return 0;
        }
        self.adjacency
            .get(a)
            .and_then(|n| n.get(b))
            .copied()
            .unwrap_or(0)
    }

    /// All co-occurrence partners of `a` with their counts.
    pub fn neighbors(&self, a: &ItemId) -> Option<&HashMap<ItemId, u64>> {
        self.adjacency.get(a)
    }

    /// Top `k` partners of `a`, ordered by descending count, ties broken by
    /// item id ascending.
    pub fn top_neighbors(&self, a: &ItemId, k: usize) -> Vec<(ItemId, u64)> {
        let Some(neighbors) = self.adjacency.get(a) else {
            return Vec::new();
        };
        let mut ranked: Vec<(ItemId, u64)> =
            neighbors.iter().map(|(id, c)| (id.clone(), *c)).collect();
        ranked.sort_unstable_by(|x, y| y.1.cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
        ranked.truncate(k);
        ranked
    }

    /// Number of items with at least one co-occurrence partner.
    pub fn item_count(&self) -> usize {
        self.adjacency.len()
    }

    fn record(&mut self, a: &ItemId, b: &ItemId) {
        *self
            .adjacency
            .entry(a.clone())
            .or_default()
            .entry(b.clone())
            .or_insert(0) += 1;
        *self
            .adjacency
            .entry(b.clone())
            .or_default()
            .entry(a.clone())
            .or_insert(0) += 1;
    }
}

/// The sparse interaction structures for one training generation.
#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    baskets: HashMap<BasketId, Vec<ItemId>>,
    cooccurrence: CoOccurrenceTable,
    popularity: HashMap<ItemId, u64>,
}

impl InteractionMatrix {
    /// Distinct member items of `basket`, in first-occurrence order.
    pub fn basket_items(&self, basket: &BasketId) -> Option<&[ItemId]> {
        self.baskets.get(basket).map(Vec::as_slice)
    }

    /// All basket memberships.
    pub fn baskets(&self) -> &HashMap<BasketId, Vec<ItemId>> {
        &self.baskets
    }

    /// The co-occurrence table.
    pub fn cooccurrence(&self) -> &CoOccurrenceTable {
        &self.cooccurrence
    }

    /// Number of baskets containing `item`.
    pub fn popularity(&self, item: &ItemId) -> u64 {
        self.popularity.get(item).copied().unwrap_or(0)
    }

    /// Per-item popularity counts.
    pub fn popularity_counts(&self) -> &HashMap<ItemId, u64> {
        &self.popularity
    }

    /// Number of distinct items.
    pub fn item_count(&self) -> usize {
        self.popularity.len()
    }

    /// Number of baskets.
    pub fn basket_count(&self) -> usize {
        self.baskets.len()
    }

    /// True when nothing was ingested.
    pub fn is_empty(&self) -> bool {
        self.baskets.is_empty() || self.popularity.is_empty()
    }

    /// Total number of basket memberships (non-zero matrix entries).
    pub fn nonzeros(&self) -> usize {
        self.baskets.values().map(Vec::len).sum()
    }

    /// Decompose into memberships, co-occurrence table, and popularity.
    pub fn into_parts(
        self,
    ) -> (
        HashMap<BasketId, Vec<ItemId>>,
        CoOccurrenceTable,
        HashMap<ItemId, u64>,
    ) {
        (self.baskets, self.cooccurrence, self.popularity)
    }
}

/// Builds an [`InteractionMatrix`] from a raw pair stream.
#[derive(Debug, Clone)]
pub struct InteractionMatrixBuilder {
    basket_cap: usize,
}

impl InteractionMatrixBuilder {
    /// Builder with the default basket cap.
    pub fn new() -> Self {
        Self {
            basket_cap: DEFAULT_BASKET_CAP,
        }
    }

    /// Override the basket size cap. A cap of zero is treated as one.
    pub fn with_basket_cap(mut self, cap: usize) -> Self {
        self.basket_cap = cap.max(1);
        self
    }

    /// Consume a pair stream and build the matrix plus its ingest report.
    ///
    /// Never fails: malformed rows are skipped and reported. Complexity is
    /// O(pairs + Σ basket_size²) with basket sizes bounded by the cap.
    pub fn build<I>(&self, pairs: I) -> (InteractionMatrix, IngestReport)
    where
        I: IntoIterator<Item = RawPair>,
    {
        let started_at = Utc::now();

        let mut baskets: HashMap<BasketId, Vec<ItemId>> = HashMap::new();
        let mut seen: HashMap<BasketId, HashSet<ItemId>> = HashMap::new();
        let mut report = IngestReport::new(started_at);

        for (idx, pair) in pairs.into_iter().enumerate() {
            let line = idx + 1;
            report.pairs_read += 1;

            let Some(basket_id) = BasketId::new(&pair.basket) else {
                report.skip(line, SkipReason::MissingBasketId, &pair);
                continue;
            };
            let Some(item_id) = ItemId::new(&pair.item) else {
                report.skip(line, SkipReason::MissingItemName, &pair);
                continue;
            };
            report.pairs_kept += 1;

            // Duplicate membership collapses; the pair still counts as kept.
            let members = seen.entry(basket_id.clone()).or_default();
            if members.insert(item_id.clone()) {
                baskets.entry(basket_id).or_default().push(item_id);
            }
        }
        drop(seen);

        // Deterministic truncation: keep the first `cap` distinct items in
        // input order, report the rest.
        for (basket_id, items) in &mut baskets {
            if items.len() > self.basket_cap {
                let dropped = items.len() - self.basket_cap;
                items.truncate(self.basket_cap);
                debug!(basket = %basket_id, dropped, cap = self.basket_cap, "truncated oversized basket");
                report.truncate(basket_id.clone(), self.basket_cap, dropped);
            }
        }

        let mut cooccurrence = CoOccurrenceTable::default();
        let mut popularity: HashMap<ItemId, u64> = HashMap::new();
        for items in baskets.values() {
            for (i, a) in items.iter().enumerate() {
                *popularity.entry(a.clone()).or_insert(0) += 1;
                for b in items.iter().skip(i + 1) {
                    cooccurrence.record(a, b);
                }
            }
        }

        let matrix = InteractionMatrix {
            baskets,
            cooccurrence,
            popularity,
        };
        report.finish(&matrix, Utc::now());

        info!(
            pairs_read = report.pairs_read,
            pairs_kept = report.pairs_kept,
            skipped = report.skipped.len(),
            baskets = report.basket_count,
            items = report.item_count,
            "interaction matrix built"
        );

        (matrix, report)
    }
}

impl Default for InteractionMatrixBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> ItemId {
        ItemId::new(name).unwrap()
    }

    fn pairs(rows: &[(&str, &str)]) -> Vec<RawPair> {
        rows.iter().map(|(b, i)| RawPair::new(*b, *i)).collect()
    }

    /// The literal scenario from the acceptance checklist:
    /// baskets {A:[x,y]}, {B:[x,z]}, {C:[x,y,z]}.
    fn three_basket_matrix() -> (InteractionMatrix, IngestReport) {
        InteractionMatrixBuilder::new().build(pairs(&[
            ("A", "x"),
            ("A", "y"),
            ("B", "x"),
            ("B", "z"),
            ("C", "x"),
            ("C", "y"),
            ("C", "z"),
        ]))
    }

    #[test]
    fn cooccurrence_counts_match_scenario() {
        let (matrix, _) = three_basket_matrix();
        let co = matrix.cooccurrence();
        assert_eq!(co.count(&item("x"), &item("y")), 2);
        assert_eq!(co.count(&item("x"), &item("z")), 2);
        assert_eq!(co.count(&item("y"), &item("z")), 1);
    }

    #[test]
    fn popularity_counts_match_scenario() {
        let (matrix, _) = three_basket_matrix();
        assert_eq!(matrix.popularity(&item("x")), 3);
        assert_eq!(matrix.popularity(&item("y")), 2);
        assert_eq!(matrix.popularity(&item("z")), 2);
    }

    #[test]
    fn cooccurrence_is_symmetric_and_excludes_self_pairs() {
        let (matrix, _) = three_basket_matrix();
        let co = matrix.cooccurrence();
        for a in ["x", "y", "z"] {
            for b in ["x", "y", "z"] {
                assert_eq!(co.count(&item(a), &item(b)), co.count(&item(b), &item(a)));
            }
            assert_eq!(co.count(&item(a), &item(a)), 0);
        }
    }

    #[test]
    fn rebuild_from_same_stream_is_identical() {
        let (first, _) = three_basket_matrix();
        let (second, _) = three_basket_matrix();
        assert_eq!(first.popularity_counts(), second.popularity_counts());
        for a in ["x", "y", "z"] {
            for b in ["x", "y", "z"] {
                assert_eq!(
                    first.cooccurrence().count(&item(a), &item(b)),
                    second.cooccurrence().count(&item(a), &item(b)),
                );
            }
        }
    }

    #[test]
    fn duplicate_lines_do_not_inflate_popularity_or_counts() {
        let (matrix, report) = InteractionMatrixBuilder::new().build(pairs(&[
            ("A", "x"),
            ("A", "x"),
            ("A", "y"),
        ]));
        assert_eq!(matrix.popularity(&item("x")), 1);
        assert_eq!(matrix.cooccurrence().count(&item("x"), &item("y")), 1);
        // The duplicate line is kept (it is well-formed), just collapsed.
        assert_eq!(report.pairs_kept, 3);
    }

    #[test]
    fn whitespace_variants_collide_onto_one_item() {
        let (matrix, _) = InteractionMatrixBuilder::new().build(pairs(&[
            ("A", " Widget "),
            ("B", "widget"),
        ]));
        assert_eq!(matrix.item_count(), 1);
        assert_eq!(matrix.popularity(&item("widget")), 2);
    }

    #[test]
    fn malformed_rows_are_skipped_with_reasons() {
        let (matrix, report) = InteractionMatrixBuilder::new().build(pairs(&[
            ("A", "x"),
            ("", "y"),
            ("B", "   "),
            ("B", "z"),
        ]));
        assert_eq!(matrix.item_count(), 2);
        assert_eq!(report.pairs_read, 4);
        assert_eq!(report.pairs_kept, 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].reason, SkipReason::MissingBasketId);
        assert_eq!(report.skipped[0].line, 2);
        assert_eq!(report.skipped[1].reason, SkipReason::MissingItemName);
        assert_eq!(report.skipped[1].line, 3);
    }

    #[test]
    fn oversized_baskets_truncate_deterministically_and_report() {
        let big: Vec<RawPair> = (0..6).map(|i| RawPair::new("A", format!("i{i}"))).collect();
        let (matrix, report) = InteractionMatrixBuilder::new()
            .with_basket_cap(4)
            .build(big);

        let kept = matrix
            .basket_items(&BasketId::new("A").unwrap())
            .unwrap()
            .to_vec();
        assert_eq!(kept, vec![item("i0"), item("i1"), item("i2"), item("i3")]);
        assert_eq!(report.truncated_baskets.len(), 1);
        assert_eq!(report.truncated_baskets[0].dropped, 2);
        // Truncated members carry no popularity or co-occurrence.
        assert_eq!(matrix.popularity(&item("i5")), 0);
    }

    #[test]
    fn report_summary_stats_cover_the_corpus() {
        let (_, report) = three_basket_matrix();
        assert_eq!(report.basket_count, 3);
        assert_eq!(report.item_count, 3);
        assert_eq!(report.max_basket_size, 3);
        assert!((report.mean_basket_size - 7.0 / 3.0).abs() < 1e-9);
        assert!(report.finished_at >= report.started_at);
    }
}
