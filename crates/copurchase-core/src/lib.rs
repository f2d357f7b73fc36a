//! Hybrid co-purchase recommendation engine.
//!
//! Recommends related items for an anchor item, basket, or ad-hoc item set
//! by combining three independent similarity signals over historical order
//! data:
//!
//! - **co-occurrence**: how often two items share a basket,
//! - **factor**: latent vectors from an ALS factorization of the
//!   basket × item membership matrix,
//! - **semantic**: embeddings of item identity from a pluggable embedder,
//!
//! under a versioned, hot-swappable [`WeightConfig`](scorer::WeightConfig)
//! with a consensus boost for multi-source agreement and a greedy diversity
//! penalty during final selection.
//!
//! # Architecture
//!
//! - [`interaction`]: raw pair stream → memberships, co-occurrence table,
//!   popularity, plus a structured ingest audit report
//! - [`factor`]: offline, seeded, deterministic ALS trainer
//! - [`embedder`]: the semantic-embedding seam and a deterministic stub
//! - [`scorer`]: pure hybrid combination and diversity selection
//! - [`engine`]: the serving façade with caching, popularity fallback,
//!   retrain orchestration, and the atomic generation swap
//!
//! Vector spaces and the TTL result cache live in `copurchase-storage`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use copurchase_core::embedder::HashEmbedder;
//! use copurchase_core::engine::RecommendationEngine;
//! use copurchase_core::interaction::RawPair;
//! use copurchase_core::types::{Anchor, ItemId};
//! use copurchase_storage::InMemoryResultCache;
//!
//! let engine = RecommendationEngine::new(
//!     Arc::new(HashEmbedder::new()),
//!     Arc::new(InMemoryResultCache::new()),
//! );
//! engine.retrain(pairs).await?;
//!
//! let anchor = Anchor::Item(ItemId::new("widget").unwrap());
//! let recommendations = engine.recommend(&anchor, 5).await?;
//! ```

pub mod embedder;
pub mod engine;
pub mod error;
pub mod factor;
pub mod interaction;
pub mod scorer;
pub mod types;

pub use error::{CopurchaseError, Result};

// The storage contract is part of this crate's public API surface.
pub use copurchase_storage::{
    InMemoryResultCache, InMemoryVectorStore, Neighbor, ResultCache, StoreError, VectorSpace,
    VectorStore,
};
