//! Signal source implementations over one snapshot.
//!
//! Each source produces its own raw-scored candidate list for an anchor;
//! the combination logic never knows where a score came from. Adding a new
//! signal means adding one implementation here; the scorer is untouched.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use copurchase_storage::similarity::normalize;
use copurchase_storage::{StoreError, VectorSpace};

use super::snapshot::Snapshot;
use crate::error::{RecommendError, Result};
use crate::scorer::SignalKind;
use crate::types::{BasketId, ItemId};

/// Run `fut` under the engine's backend deadline.
///
/// An elapsed timer becomes [`RecommendError::BackendTimeout`]; the caller
/// degrades (cache miss, missing signal), it never crashes the request.
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    operation: &'static str,
    fut: impl Future<Output = T> + Send,
) -> std::result::Result<T, RecommendError> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| RecommendError::BackendTimeout { operation })
}

/// A signal source bound to one snapshot generation.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Which signal this source implements.
    fn kind(&self) -> SignalKind;

    /// Raw-scored candidates for the anchor.
    ///
    /// `members` is the anchor's resolved item set (one entry for an item
    /// anchor); `basket` is set when the anchor is a basket known from
    /// training. An anchor this source has nothing for yields an empty
    /// list, not an error; errors are reserved for backend failures, which
    /// the engine degrades to a missing signal.
    async fn candidates(
        &self,
        members: &[ItemId],
        basket: Option<&BasketId>,
    ) -> Result<Vec<(ItemId, f32)>>;
}

/// Co-purchase counts from the snapshot's co-occurrence table.
pub(crate) struct CoOccurrenceSource {
    pub snapshot: Arc<Snapshot>,
    pub pool: usize,
}

#[async_trait]
impl SignalSource for CoOccurrenceSource {
    fn kind(&self) -> SignalKind {
        SignalKind::CoOccurrence
    }

    async fn candidates(
        &self,
        members: &[ItemId],
        _basket: Option<&BasketId>,
    ) -> Result<Vec<(ItemId, f32)>> {
        let table = self.snapshot.cooccurrence();
        if members.len() == 1 {
            return Ok(table
                .top_neighbors(&members[0], self.pool)
                .into_iter()
                .map(|(id, count)| (id, count as f32))
                .collect());
        }

        // Basket anchor: sum co-purchase counts across members.
        let mut summed: HashMap<ItemId, u64> = HashMap::new();
        for member in members {
            if let Some(neighbors) = table.neighbors(member) {
                for (id, count) in neighbors {
                    *summed.entry(id.clone()).or_insert(0) += count;
                }
            }
        }
        let mut ranked: Vec<(ItemId, u64)> = summed.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.pool + members.len());
        Ok(ranked
            .into_iter()
            .map(|(id, count)| (id, count as f32))
            .collect())
    }
}

/// Latent-factor similarity from the snapshot's factor spaces.
///
/// Basket anchors use the trained basket vector when one exists; otherwise
/// (cold start) the query vector is synthesized as the (optionally
/// popularity-weighted) mean of the member item factors, on read, never
/// persisted.
pub(crate) struct FactorSource {
    pub snapshot: Arc<Snapshot>,
    pub deadline: Duration,
    pub pool: usize,
    pub popularity_weighted: bool,
}

#[async_trait]
impl SignalSource for FactorSource {
    fn kind(&self) -> SignalKind {
        SignalKind::Factor
    }

    async fn candidates(
        &self,
        members: &[ItemId],
        basket: Option<&BasketId>,
    ) -> Result<Vec<(ItemId, f32)>> {
        let store = self.snapshot.vectors();

        if members.len() == 1 && basket.is_none() {
            return match with_deadline(
                self.deadline,
                "factor nearest",
                store.nearest_to(VectorSpace::FactorItem, members[0].as_str(), self.pool),
            )
            .await?
            {
                Ok(hits) => Ok(hits
                    .into_iter()
                    .filter_map(|n| ItemId::new(&n.id).map(|id| (id, n.similarity)))
                    .collect()),
                Err(StoreError::NotFound { .. }) => Ok(Vec::new()),
                Err(other) => Err(other.into()),
            };
        }

        let query = match self.basket_query_vector(members, basket).await? {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };
        let hits = match with_deadline(
            self.deadline,
            "factor nearest",
            store.nearest(VectorSpace::FactorItem, &query, self.pool + members.len()),
        )
        .await?
        {
            Ok(hits) => hits,
            Err(StoreError::InvalidVector { .. }) => return Ok(Vec::new()),
            Err(other) => return Err(other.into()),
        };
        Ok(hits
            .into_iter()
            .filter_map(|n| ItemId::new(&n.id).map(|id| (id, n.similarity)))
            .collect())
    }
}

impl FactorSource {
    /// Trained basket vector if present, else a cold-start centroid of the
    /// member item factors.
    async fn basket_query_vector(
        &self,
        members: &[ItemId],
        basket: Option<&BasketId>,
    ) -> Result<Option<Vec<f32>>> {
        let store = self.snapshot.vectors();

        if let Some(basket_id) = basket {
            match with_deadline(
                self.deadline,
                "factor basket lookup",
                store.get(VectorSpace::FactorBasket, basket_id.as_str()),
            )
            .await?
            {
                Ok(vector) => return Ok(Some(vector)),
                Err(StoreError::NotFound { .. }) => {
                    debug!(basket = %basket_id, "basket untrained, synthesizing cold-start vector");
                }
                Err(other) => return Err(other.into()),
            }
        }

        let weigher = |item: &ItemId| {
            if self.popularity_weighted {
                self.snapshot
                    .items()
                    .get(item)
                    .map(|i| i.popularity.max(1) as f32)
                    .unwrap_or(1.0)
            } else {
                1.0
            }
        };
        member_centroid(
            &self.snapshot,
            VectorSpace::FactorItem,
            members,
            self.deadline,
            weigher,
        )
        .await
    }
}

/// Semantic-embedding similarity from the snapshot's semantic space.
pub(crate) struct SemanticSource {
    pub snapshot: Arc<Snapshot>,
    pub deadline: Duration,
    pub pool: usize,
}

#[async_trait]
impl SignalSource for SemanticSource {
    fn kind(&self) -> SignalKind {
        SignalKind::Semantic
    }

    async fn candidates(
        &self,
        members: &[ItemId],
        _basket: Option<&BasketId>,
    ) -> Result<Vec<(ItemId, f32)>> {
        let store = self.snapshot.vectors();

        if members.len() == 1 {
            return match with_deadline(
                self.deadline,
                "semantic nearest",
                store.nearest_to(VectorSpace::Semantic, members[0].as_str(), self.pool),
            )
            .await?
            {
                Ok(hits) => Ok(hits
                    .into_iter()
                    .filter_map(|n| ItemId::new(&n.id).map(|id| (id, n.similarity)))
                    .collect()),
                Err(StoreError::NotFound { .. }) => Ok(Vec::new()),
                Err(other) => Err(other.into()),
            };
        }

        let query = match member_centroid(
            &self.snapshot,
            VectorSpace::Semantic,
            members,
            self.deadline,
            |_| 1.0,
        )
        .await?
        {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };
        let hits = match with_deadline(
            self.deadline,
            "semantic nearest",
            store.nearest(VectorSpace::Semantic, &query, self.pool + members.len()),
        )
        .await?
        {
            Ok(hits) => hits,
            Err(StoreError::InvalidVector { .. }) => return Ok(Vec::new()),
            Err(other) => return Err(other.into()),
        };
        Ok(hits
            .into_iter()
            .filter_map(|n| ItemId::new(&n.id).map(|id| (id, n.similarity)))
            .collect())
    }
}

/// Weighted, normalized centroid of the member vectors present in `space`.
///
/// Members without a vector are skipped; when none have one, or the
/// centroid degenerates to zero, there is no usable query (`None`).
async fn member_centroid<F>(
    snapshot: &Arc<Snapshot>,
    space: VectorSpace,
    members: &[ItemId],
    deadline: Duration,
    weigh: F,
) -> Result<Option<Vec<f32>>>
where
    F: Fn(&ItemId) -> f32,
{
    let store = snapshot.vectors();
    let mut centroid: Option<Vec<f32>> = None;
    let mut total_weight = 0.0f32;

    for member in members {
        let fetched = with_deadline(
            deadline,
            "centroid member lookup",
            store.get(space, member.as_str()),
        )
        .await?;
        let vector = match fetched {
            Ok(v) => v,
            Err(StoreError::NotFound { .. }) => continue,
            Err(other) => {
                warn!(space = %space, item = %member, error = %other, "skipping member during centroid synthesis");
                continue;
            }
        };
        let weight = weigh(member).max(0.0);
        if weight == 0.0 {
            continue;
        }
        match centroid {
            None => {
                centroid = Some(vector.iter().map(|x| x * weight).collect());
            }
            Some(ref mut acc) if acc.len() == vector.len() => {
                for (a, v) in acc.iter_mut().zip(vector.iter()) {
                    *a += v * weight;
                }
            }
            Some(_) => continue,
        }
        total_weight += weight;
    }

    let Some(mut centroid) = centroid else {
        return Ok(None);
    };
    if total_weight > 0.0 {
        for x in centroid.iter_mut() {
            *x /= total_weight;
        }
    }
    normalize(&mut centroid);
    if centroid.iter().all(|x| *x == 0.0) {
        return Ok(None);
    }
    Ok(Some(centroid))
}
