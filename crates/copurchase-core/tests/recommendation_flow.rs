//! End-to-end flows through the recommendation façade: compute, fallback,
//! exclusion, caching, and degradation behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use copurchase_core::embedder::HashEmbedder;
use copurchase_core::engine::{EngineConfig, RecommendationEngine};
use copurchase_core::error::{CopurchaseError, RecommendError};
use copurchase_core::factor::FactorConfig;
use copurchase_core::interaction::RawPair;
use copurchase_core::scorer::WeightConfig;
use copurchase_core::types::{Anchor, BasketId, ItemId, RecommendationReason};
use copurchase_core::{InMemoryResultCache, ResultCache};

fn item(name: &str) -> ItemId {
    ItemId::new(name).unwrap()
}

fn grocery_pairs() -> Vec<RawPair> {
    [
        ("o1", "bread"),
        ("o1", "butter"),
        ("o1", "jam"),
        ("o2", "bread"),
        ("o2", "butter"),
        ("o3", "bread"),
        ("o3", "milk"),
        ("o4", "milk"),
        ("o4", "cereal"),
        ("o5", "cereal"),
        ("o5", "milk"),
        ("o5", "banana"),
        ("o6", "bread"),
        ("o6", "jam"),
    ]
    .into_iter()
    .map(|(b, i)| RawPair::new(b, i))
    .collect()
}

fn test_config() -> EngineConfig {
    EngineConfig {
        factor: FactorConfig::default()
            .with_rank(8)
            .with_iterations(10)
            .with_seed(42),
        ..EngineConfig::default()
    }
}

fn engine() -> RecommendationEngine {
    RecommendationEngine::with_config(
        test_config(),
        Arc::new(HashEmbedder::with_dimensions(16)),
        Arc::new(InMemoryResultCache::new()),
    )
}

async fn trained_engine() -> RecommendationEngine {
    let engine = engine();
    engine.retrain(grocery_pairs()).await.unwrap();
    engine
}

#[tokio::test]
async fn item_anchor_yields_related_items() {
    let engine = trained_engine().await;
    let results = engine
        .recommend(&Anchor::Item(item("bread")), 3)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results.len() <= 3);
    assert!(results.iter().all(|r| r.item != item("bread")));
    // Ordered by descending final score.
    for window in results.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
}

#[tokio::test]
async fn basket_anchor_never_returns_its_own_members() {
    let engine = trained_engine().await;
    let results = engine
        .recommend(&Anchor::Basket(BasketId::new("o1").unwrap()), 5)
        .await
        .unwrap();

    assert!(!results.is_empty());
    for member in ["bread", "butter", "jam"] {
        assert!(
            results.iter().all(|r| r.item != item(member)),
            "anchor member {member} leaked into recommendations"
        );
    }
}

#[tokio::test]
async fn item_set_anchor_cold_start_still_recommends() {
    let engine = trained_engine().await;
    // This exact basket never occurred at training time.
    let anchor = Anchor::ItemSet(vec![item("bread"), item("cereal")]);
    let results = engine.recommend(&anchor, 4).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.item != item("bread")));
    assert!(results.iter().all(|r| r.item != item("cereal")));
}

#[tokio::test]
async fn zero_weights_fall_back_entirely_to_popularity() {
    let engine = trained_engine().await;
    engine
        .update_weights(
            WeightConfig::default()
                .with_weights(0.0, 0.0, 0.0)
                .with_version(2),
        )
        .unwrap();

    let results = engine
        .recommend(&Anchor::Item(item("bread")), 3)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results
        .iter()
        .all(|r| r.reason == RecommendationReason::Popularity));
    assert!(results.iter().all(|r| r.popularity_rank.is_some()));
    assert!(results.iter().all(|r| r.item != item("bread")));
}

#[tokio::test]
async fn unseen_anchor_serves_popularity_fallback() {
    let engine = trained_engine().await;
    let results = engine
        .recommend(&Anchor::Item(item("flux capacitor")), 3)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|r| r.reason == RecommendationReason::Popularity));
    // bread tops the popularity ranking (4 baskets).
    assert_eq!(results[0].item, item("bread"));
    assert_eq!(results[0].popularity_rank, Some(1));
}

#[tokio::test]
async fn untrained_engine_has_nothing_to_recommend() {
    let engine = engine();
    let err = engine
        .recommend(&Anchor::Item(item("bread")), 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CopurchaseError::Recommend(RecommendError::NoRecommendationsAvailable)
    ));
}

#[tokio::test]
async fn zero_limit_is_rejected() {
    let engine = trained_engine().await;
    let err = engine
        .recommend(&Anchor::Item(item("bread")), 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CopurchaseError::Recommend(RecommendError::InvalidRequest { .. })
    ));
}

#[tokio::test]
async fn empty_item_set_anchor_is_rejected() {
    let engine = trained_engine().await;
    let err = engine
        .recommend(&Anchor::ItemSet(Vec::new()), 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CopurchaseError::Recommend(RecommendError::InvalidRequest { .. })
    ));
}

#[tokio::test]
async fn popular_lists_items_by_basket_membership() {
    let engine = trained_engine().await;
    let popular = engine.popular(2);
    assert_eq!(popular.len(), 2);
    assert_eq!(popular[0].item, item("bread"));
    assert!((popular[0].score - 1.0).abs() < 1e-6);
    assert_eq!(popular[1].item, item("milk"));
}

#[tokio::test]
async fn item_stats_reports_popularity_and_partners() {
    let engine = trained_engine().await;
    let stats = engine.item_stats(&item("bread")).unwrap();
    assert_eq!(stats.popularity, 4);
    assert_eq!(stats.popularity_rank, 1);
    assert!(stats.cooccurring_items >= 3);
    assert!(stats
        .top_cooccurring
        .iter()
        .any(|(partner, _)| *partner == item("butter")));

    assert!(engine.item_stats(&item("flux capacitor")).is_none());
}

#[tokio::test]
async fn weight_update_requires_increasing_version() {
    let engine = trained_engine().await;
    let stale = WeightConfig::default().with_version(1);
    assert!(engine.update_weights(stale).is_err());

    let next = WeightConfig::default().with_version(2);
    assert_eq!(engine.update_weights(next).unwrap(), 2);
    assert_eq!(engine.weights().version, 2);
}

#[tokio::test]
async fn invalid_weight_values_are_rejected() {
    let engine = trained_engine().await;
    let bad = WeightConfig::default()
        .with_weights(-1.0, 1.0, 1.0)
        .with_version(5);
    let err = engine.update_weights(bad).unwrap_err();
    assert!(matches!(
        err,
        CopurchaseError::Recommend(RecommendError::InvalidWeights { .. })
    ));
    // Current config untouched.
    assert_eq!(engine.weights().version, 1);
}

/// Cache wrapper counting round-trips.
struct CountingCache {
    inner: InMemoryResultCache,
    hits: AtomicUsize,
    puts: AtomicUsize,
}

impl CountingCache {
    fn new() -> Self {
        Self {
            inner: InMemoryResultCache::new(),
            hits: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ResultCache for CountingCache {
    async fn get(&self, key: &str) -> Option<String> {
        let found = self.inner.get(key).await;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    async fn put(&self, key: &str, value: String) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.inner.put(key, value).await;
    }
}

#[tokio::test]
async fn repeated_requests_are_served_from_cache() {
    let cache = Arc::new(CountingCache::new());
    let engine = RecommendationEngine::with_config(
        test_config(),
        Arc::new(HashEmbedder::with_dimensions(16)),
        cache.clone(),
    );
    engine.retrain(grocery_pairs()).await.unwrap();

    let anchor = Anchor::Item(item("bread"));
    let first = engine.recommend(&anchor, 3).await.unwrap();
    let second = engine.recommend(&anchor, 3).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.puts.load(Ordering::Relaxed), 1);
    assert_eq!(cache.hits.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn weight_swap_invalidates_cached_results() {
    let cache = Arc::new(CountingCache::new());
    let engine = RecommendationEngine::with_config(
        test_config(),
        Arc::new(HashEmbedder::with_dimensions(16)),
        cache.clone(),
    );
    engine.retrain(grocery_pairs()).await.unwrap();

    let anchor = Anchor::Item(item("bread"));
    engine.recommend(&anchor, 3).await.unwrap();
    engine
        .update_weights(WeightConfig::default().with_version(2))
        .unwrap();
    engine.recommend(&anchor, 3).await.unwrap();

    // Second request keyed under the new weight version: computed fresh.
    assert_eq!(cache.hits.load(Ordering::Relaxed), 0);
    assert_eq!(cache.puts.load(Ordering::Relaxed), 2);
}

/// Cache that always exceeds the engine's backend deadline.
struct StalledCache;

#[async_trait]
impl ResultCache for StalledCache {
    async fn get(&self, _key: &str) -> Option<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        None
    }

    async fn put(&self, _key: &str, _value: String) {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}

#[tokio::test]
async fn stalled_cache_degrades_to_miss_not_failure() {
    let config = EngineConfig {
        backend_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let engine = RecommendationEngine::with_config(
        config,
        Arc::new(HashEmbedder::with_dimensions(16)),
        Arc::new(StalledCache),
    );
    engine.retrain(grocery_pairs()).await.unwrap();

    let results = engine
        .recommend(&Anchor::Item(item("bread")), 3)
        .await
        .unwrap();
    assert!(!results.is_empty());
}
