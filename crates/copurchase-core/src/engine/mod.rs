//! Recommendation engine façade.
//!
//! The single entry point the serving layer calls. Per request:
//! validate → cache lookup → (hit: return) → hybrid compute → popularity
//! fallback when compute comes up short → cache store → return. Retraining
//! runs as a single-flight offline batch whose output (interaction
//! structures plus freshly populated vector spaces) is swapped in as one
//! `Arc<Snapshot>`, so concurrent readers always see a complete generation.

mod snapshot;
mod sources;

pub use snapshot::Snapshot;
pub use sources::SignalSource;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use copurchase_storage::{
    InMemoryVectorStore, ResultCache, StoreError, VectorSpace, VectorStore,
};

use crate::embedder::SemanticEmbedder;
use crate::error::{EmbeddingError, RecommendError, Result};
use crate::factor::{FactorConfig, FactorTrainer, TrainingReport};
use crate::interaction::{IngestReport, InteractionMatrixBuilder, RawPair, DEFAULT_BASKET_CAP};
use crate::scorer::{self, SignalCandidates, WeightConfig};
use crate::types::{Anchor, BasketId, ItemId, RecommendationReason, ScoredRecommendation};

use sources::{with_deadline, CoOccurrenceSource, FactorSource, SemanticSource};

/// Engine-level configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fewer computed results than this trigger the popularity fallback.
    pub min_results: usize,
    /// Candidates fetched per signal source before combination.
    pub candidate_pool: usize,
    /// Deadline for every vector-store and cache call.
    pub backend_timeout: Duration,
    /// Basket size cap applied during ingestion.
    pub basket_cap: usize,
    /// Factor-training configuration used by [`RecommendationEngine::retrain`].
    pub factor: FactorConfig,
    /// Weigh cold-start basket centroids by member popularity.
    pub popularity_weighted_basket: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_results: 3,
            candidate_pool: 50,
            backend_timeout: Duration::from_millis(500),
            basket_cap: DEFAULT_BASKET_CAP,
            factor: FactorConfig::default(),
            popularity_weighted_basket: false,
        }
    }
}

/// Operator-facing outcome of one retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainReport {
    /// Generation now being served.
    pub generation: u64,
    /// Ingestion audit record.
    pub ingest: IngestReport,
    /// Factor-training summary.
    pub training: TrainingReport,
    /// Items that received a semantic embedding.
    pub embedded_items: usize,
    /// Items whose embedding failed, with reasons; the semantic signal is
    /// simply absent for these.
    pub embedding_failures: Vec<(ItemId, String)>,
}

/// Statistics for one catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    /// The item.
    pub item: ItemId,
    /// Baskets containing the item.
    pub popularity: u64,
    /// 1-based rank in the popularity ordering.
    pub popularity_rank: usize,
    /// Number of distinct co-purchase partners.
    pub cooccurring_items: usize,
    /// Strongest co-purchase partners with counts.
    pub top_cooccurring: Vec<(ItemId, u64)>,
}

type StoreFactory = Box<dyn Fn() -> Arc<dyn VectorStore> + Send + Sync>;

/// The hybrid recommendation engine.
///
/// Shared mutable state is exactly two swap points, the snapshot pointer
/// and the weight configuration, both behind `parking_lot` locks holding
/// `Arc`s, plus the single-flight retrain flag. Request computation reads
/// one cloned `Arc` of each and is otherwise lock-free.
pub struct RecommendationEngine {
    config: EngineConfig,
    embedder: Arc<dyn SemanticEmbedder>,
    cache: Arc<dyn ResultCache>,
    store_factory: StoreFactory,
    weights: RwLock<Arc<WeightConfig>>,
    snapshot: RwLock<Arc<Snapshot>>,
    retraining: AtomicBool,
}

impl RecommendationEngine {
    /// Engine with default configuration and in-memory vector spaces.
    pub fn new(embedder: Arc<dyn SemanticEmbedder>, cache: Arc<dyn ResultCache>) -> Self {
        Self::with_config(EngineConfig::default(), embedder, cache)
    }

    /// Engine with explicit configuration.
    pub fn with_config(
        config: EngineConfig,
        embedder: Arc<dyn SemanticEmbedder>,
        cache: Arc<dyn ResultCache>,
    ) -> Self {
        Self {
            config,
            embedder,
            cache,
            store_factory: Box::new(|| Arc::new(InMemoryVectorStore::new())),
            weights: RwLock::new(Arc::new(WeightConfig::default())),
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            retraining: AtomicBool::new(false),
        }
    }

    /// Replace the factory that provisions one vector store per generation.
    pub fn with_store_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn VectorStore> + Send + Sync + 'static,
    {
        self.store_factory = Box::new(factory);
        self
    }

    /// The snapshot currently being served.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Generation currently being served (0 before the first retrain).
    pub fn generation(&self) -> u64 {
        self.snapshot.read().generation()
    }

    /// The weight configuration currently applied to scoring.
    pub fn weights(&self) -> Arc<WeightConfig> {
        self.weights.read().clone()
    }

    /// Hot-swap the weight configuration.
    ///
    /// Validated, and the proposed version must strictly exceed the current
    /// one; readers mid-request keep the snapshot they already took.
    pub fn update_weights(&self, proposed: WeightConfig) -> Result<u64> {
        proposed.validate()?;
        let mut slot = self.weights.write();
        if proposed.version <= slot.version {
            return Err(RecommendError::InvalidWeights {
                reason: format!(
                    "version {} must exceed current version {}",
                    proposed.version, slot.version
                ),
            }
            .into());
        }
        let version = proposed.version;
        *slot = Arc::new(proposed);
        info!(version, "weight configuration swapped");
        Ok(version)
    }

    /// Rebuild interaction structures, retrain factors, re-embed items, and
    /// swap the new generation in.
    ///
    /// Single-flight: a trigger while another retrain runs is rejected with
    /// [`RecommendError::RetrainInProgress`], not queued. On any failure the
    /// previous snapshot remains servable; the swap is the last step.
    pub async fn retrain<I>(&self, pairs: I) -> Result<RetrainReport>
    where
        I: IntoIterator<Item = RawPair>,
    {
        let _guard = RetrainGuard::acquire(&self.retraining)?;

        let (matrix, ingest) = InteractionMatrixBuilder::new()
            .with_basket_cap(self.config.basket_cap)
            .build(pairs);
        let (model, training) = FactorTrainer::new(self.config.factor.clone()).train(&matrix)?;

        let store = (self.store_factory)();
        let item_mapping: HashMap<String, Vec<f32>> = model
            .item_factors
            .into_iter()
            .map(|(id, v)| (id.as_str().to_owned(), v))
            .collect();
        store
            .bulk_replace(VectorSpace::FactorItem, item_mapping)
            .await?;
        let basket_mapping: HashMap<String, Vec<f32>> = model
            .basket_factors
            .into_iter()
            .map(|(id, v)| (id.as_str().to_owned(), v))
            .collect();
        store
            .bulk_replace(VectorSpace::FactorBasket, basket_mapping)
            .await?;

        // Semantic space: per-item failures degrade that item, never the run.
        let mut items: Vec<ItemId> = matrix.popularity_counts().keys().cloned().collect();
        items.sort_unstable();
        let expected_dims = self.embedder.dimensions();
        let mut semantic_mapping: HashMap<String, Vec<f32>> = HashMap::new();
        let mut embedding_failures: Vec<(ItemId, String)> = Vec::new();
        for (item, outcome) in self.embedder.embed_batch(&items).await {
            match outcome {
                Ok(vector) if vector.len() == expected_dims => {
                    semantic_mapping.insert(item.as_str().to_owned(), vector);
                }
                Ok(vector) => {
                    let err = EmbeddingError::DimensionMismatch {
                        item: item.as_str().to_owned(),
                        expected: expected_dims,
                        actual: vector.len(),
                    };
                    warn!(item = %item, error = %err, "embedding rejected");
                    embedding_failures.push((item, err.to_string()));
                }
                Err(err) => {
                    warn!(item = %item, error = %err, "embedding unavailable");
                    embedding_failures.push((item, err.to_string()));
                }
            }
        }
        let embedded_items = semantic_mapping.len();
        if !semantic_mapping.is_empty() {
            store
                .bulk_replace(VectorSpace::Semantic, semantic_mapping)
                .await?;
        }

        let generation = self.snapshot.read().generation() + 1;
        let next = Arc::new(Snapshot::from_matrix(generation, matrix, store));
        *self.snapshot.write() = next;

        info!(
            generation,
            items = ingest.item_count,
            baskets = ingest.basket_count,
            embedded = embedded_items,
            "new generation swapped in"
        );

        Ok(RetrainReport {
            generation,
            ingest,
            training,
            embedded_items,
            embedding_failures,
        })
    }

    /// Produce up to `limit` recommendations for `anchor`.
    ///
    /// Never fails on degraded signals: sources that error or time out are
    /// dropped from combination, and short results are topped up from the
    /// popularity ranking. Fails only on invalid input or when the item
    /// registry itself is empty.
    pub async fn recommend(
        &self,
        anchor: &Anchor,
        limit: usize,
    ) -> Result<Vec<ScoredRecommendation>> {
        if limit == 0 {
            return Err(RecommendError::InvalidRequest {
                reason: "limit must be at least 1".into(),
            }
            .into());
        }
        if matches!(anchor, Anchor::ItemSet(items) if items.is_empty()) {
            return Err(RecommendError::InvalidRequest {
                reason: "item-set anchor must not be empty".into(),
            }
            .into());
        }

        let snapshot = self.snapshot();
        let weights = self.weights();
        if snapshot.is_empty() {
            return Err(RecommendError::NoRecommendationsAvailable.into());
        }

        let cache_key = format!(
            "rec:g{}:w{}:n{}:{}",
            snapshot.generation(),
            weights.version,
            limit,
            anchor.cache_key()
        );
        if let Some(hit) = self.cache_lookup(&cache_key).await {
            return Ok(hit);
        }

        let (members, basket_ref, anchor_seen) = match Self::resolve_anchor(&snapshot, anchor) {
            Ok((members, basket_ref)) => (members, basket_ref, true),
            Err(err) => {
                // AnchorNotFound is a fallback trigger, never a caller error.
                debug!(error = %err, "serving popularity fallback");
                (Vec::new(), None, false)
            }
        };
        let member_set: HashSet<&ItemId> = members.iter().collect();

        let mut results = if anchor_seen {
            self.compute(&snapshot, &weights, &members, basket_ref.as_ref(), limit)
                .await
        } else {
            Vec::new()
        };

        if results.len() < self.config.min_results.min(limit) {
            self.fill_from_popularity(&snapshot, &member_set, limit, &mut results);
        }

        self.cache_store(&cache_key, &results).await;
        Ok(results)
    }

    /// Top items by popularity, scored relative to the most popular item.
    pub fn popular(&self, limit: usize) -> Vec<ScoredRecommendation> {
        let snapshot = self.snapshot();
        let max = snapshot.max_popularity().max(1) as f32;
        snapshot
            .popularity_ranked()
            .iter()
            .take(limit)
            .enumerate()
            .map(|(idx, (item, count))| ScoredRecommendation {
                item: item.clone(),
                score: *count as f32 / max,
                reason: RecommendationReason::Popularity,
                popularity_rank: Some(idx + 1),
            })
            .collect()
    }

    /// Popularity and co-purchase statistics for one item, or `None` when
    /// the item is unknown to the current generation.
    pub fn item_stats(&self, item: &ItemId) -> Option<ItemStats> {
        let snapshot = self.snapshot();
        let entry = snapshot.items().get(item)?;
        let rank = snapshot.popularity_rank(item)?;
        let cooccurring = snapshot
            .cooccurrence()
            .neighbors(item)
            .map(HashMap::len)
            .unwrap_or(0);
        Some(ItemStats {
            item: item.clone(),
            popularity: entry.popularity,
            popularity_rank: rank,
            cooccurring_items: cooccurring,
            top_cooccurring: snapshot.cooccurrence().top_neighbors(item, 10),
        })
    }

    /// Resolve the anchor against the snapshot, or report it unseen.
    fn resolve_anchor(
        snapshot: &Arc<Snapshot>,
        anchor: &Anchor,
    ) -> std::result::Result<(Vec<ItemId>, Option<BasketId>), RecommendError> {
        let not_found = || RecommendError::AnchorNotFound {
            anchor: anchor.cache_key(),
        };
        match anchor {
            Anchor::Item(id) => {
                if snapshot.items().contains_key(id) {
                    Ok((vec![id.clone()], None))
                } else {
                    Err(not_found())
                }
            }
            Anchor::Basket(basket_id) => snapshot
                .basket_items(basket_id)
                .map(|items| (items.to_vec(), Some(basket_id.clone())))
                .ok_or_else(not_found),
            Anchor::ItemSet(items) => {
                let mut distinct = Vec::new();
                for item in items {
                    if !distinct.contains(item) {
                        distinct.push(item.clone());
                    }
                }
                // An ad-hoc set is workable if any member is known.
                if distinct.iter().any(|i| snapshot.items().contains_key(i)) {
                    Ok((distinct, None))
                } else {
                    Err(not_found())
                }
            }
        }
    }

    async fn compute(
        &self,
        snapshot: &Arc<Snapshot>,
        weights: &WeightConfig,
        members: &[ItemId],
        basket: Option<&BasketId>,
        limit: usize,
    ) -> Vec<ScoredRecommendation> {
        let pool = self.config.candidate_pool.max(limit);
        let sources: Vec<Box<dyn SignalSource>> = vec![
            Box::new(CoOccurrenceSource {
                snapshot: snapshot.clone(),
                pool,
            }),
            Box::new(FactorSource {
                snapshot: snapshot.clone(),
                deadline: self.config.backend_timeout,
                pool,
                popularity_weighted: self.config.popularity_weighted_basket,
            }),
            Box::new(SemanticSource {
                snapshot: snapshot.clone(),
                deadline: self.config.backend_timeout,
                pool,
            }),
        ];

        let mut batches = Vec::with_capacity(sources.len());
        for source in &sources {
            if weights.weight_for(source.kind()) <= 0.0 {
                continue;
            }
            match source.candidates(members, basket).await {
                Ok(scored) if !scored.is_empty() => {
                    batches.push(SignalCandidates::new(source.kind(), scored));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(source = source.kind().as_str(), error = %err, "signal source degraded");
                }
            }
        }

        let member_set: HashSet<&ItemId> = members.iter().collect();
        let mut ranked = scorer::combine(&batches, weights);
        ranked.retain(|c| !member_set.contains(&c.item));

        let factor_vectors = self
            .diversity_vectors(snapshot, &ranked, limit, weights)
            .await;
        let selected = scorer::select_diverse(ranked, limit, weights, &factor_vectors);

        selected
            .into_iter()
            .map(|c| {
                ScoredRecommendation::new(
                    c.item,
                    c.score,
                    RecommendationReason::from_sources(&c.sources),
                )
            })
            .collect()
    }

    /// Factor vectors for the candidates the greedy selection can touch.
    async fn diversity_vectors(
        &self,
        snapshot: &Arc<Snapshot>,
        ranked: &[scorer::CombinedCandidate],
        limit: usize,
        weights: &WeightConfig,
    ) -> HashMap<ItemId, Vec<f32>> {
        let mut vectors = HashMap::new();
        if weights.diversity_penalty <= 0.0 || ranked.is_empty() {
            return vectors;
        }
        let store = snapshot.vectors();
        let horizon = ranked.len().min(limit.saturating_mul(4).max(limit));
        for candidate in ranked.iter().take(horizon) {
            let fetched = with_deadline(
                self.config.backend_timeout,
                "diversity vector lookup",
                store.get(VectorSpace::FactorItem, candidate.item.as_str()),
            )
            .await;
            match fetched {
                Ok(Ok(vector)) => {
                    vectors.insert(candidate.item.clone(), vector);
                }
                Ok(Err(StoreError::NotFound { .. })) => {}
                Ok(Err(err)) => {
                    warn!(item = %candidate.item, error = %err, "diversity lookup failed");
                }
                Err(err) => {
                    // Timed out: select without penalties rather than stall.
                    warn!(error = %err, "diversity lookups degraded");
                    break;
                }
            }
        }
        vectors
    }

    fn fill_from_popularity(
        &self,
        snapshot: &Arc<Snapshot>,
        exclude: &HashSet<&ItemId>,
        limit: usize,
        results: &mut Vec<ScoredRecommendation>,
    ) {
        let max = snapshot.max_popularity().max(1) as f32;
        let already: HashSet<ItemId> = results.iter().map(|r| r.item.clone()).collect();
        for (idx, (item, count)) in snapshot.popularity_ranked().iter().enumerate() {
            if results.len() >= limit {
                break;
            }
            if exclude.contains(item) || already.contains(item) {
                continue;
            }
            results.push(ScoredRecommendation {
                item: item.clone(),
                score: *count as f32 / max,
                reason: RecommendationReason::Popularity,
                popularity_rank: Some(idx + 1),
            });
        }
    }

    async fn cache_lookup(&self, key: &str) -> Option<Vec<ScoredRecommendation>> {
        let fetched = with_deadline(
            self.config.backend_timeout,
            "cache lookup",
            self.cache.get(key),
        )
        .await;
        match fetched {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(results) => {
                    debug!(key, "cache hit");
                    Some(results)
                }
                Err(err) => {
                    warn!(key, error = %err, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "cache lookup degraded to miss");
                None
            }
        }
    }

    async fn cache_store(&self, key: &str, results: &[ScoredRecommendation]) {
        let payload = match serde_json::to_string(results) {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "failed to serialize results for caching");
                return;
            }
        };
        let stored = with_deadline(
            self.config.backend_timeout,
            "cache store",
            self.cache.put(key, payload),
        )
        .await;
        if let Err(err) = stored {
            warn!(key, error = %err, "cache store skipped");
        }
    }
}

/// Single-flight retrain guard; released on drop, panic included.
struct RetrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RetrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RecommendError::RetrainInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for RetrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
