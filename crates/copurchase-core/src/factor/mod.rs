//! Offline latent-factor training over basket/item memberships.
//!
//! Alternating least squares on the binary basket × item matrix: each
//! basket and each item that appears at least once receives a rank-`k`
//! vector such that the inner product of a basket vector and a member item
//! vector approximates 1. Training is strictly batch (it never runs on the
//! request path) and its output is swapped in atomically by the engine.
//!
//! Determinism: the random seed is an explicit input, entity index maps are
//! built over sorted ids, and the per-row solves are order-independent, so
//! a fixed corpus and seed reproduce the factors exactly.

mod solve;

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TrainingError;
use crate::interaction::InteractionMatrix;
use crate::types::{BasketId, ItemId};

use solve::solve_ridge_row;

/// Default latent rank.
pub const DEFAULT_RANK: usize = 100;

/// Default iteration budget.
pub const DEFAULT_ITERATIONS: usize = 15;

/// Configuration for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorConfig {
    /// Latent dimension `k`.
    pub rank: usize,
    /// Maximum number of alternating iterations.
    pub iterations: usize,
    /// Ridge regularization strength (must be positive).
    pub regularization: f64,
    /// Explicit random seed for item-factor initialization.
    pub seed: u64,
    /// Stop early once the per-iteration RMSE improvement drops below this.
    pub tolerance: f64,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            rank: DEFAULT_RANK,
            iterations: DEFAULT_ITERATIONS,
            regularization: 0.1,
            seed: 0,
            tolerance: 1e-4,
        }
    }
}

impl FactorConfig {
    /// Set the latent rank.
    #[inline]
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Set the iteration budget.
    #[inline]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the random seed.
    #[inline]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the regularization strength.
    #[inline]
    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    fn validate(&self) -> Result<(), TrainingError> {
        if self.rank == 0 {
            return Err(TrainingError::InvalidConfig {
                reason: "rank must be at least 1".into(),
            });
        }
        if self.iterations == 0 {
            return Err(TrainingError::InvalidConfig {
                reason: "iteration budget must be at least 1".into(),
            });
        }
        if !(self.regularization.is_finite() && self.regularization > 0.0) {
            return Err(TrainingError::InvalidConfig {
                reason: "regularization must be a positive finite number".into(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(TrainingError::InvalidConfig {
                reason: "tolerance must be a non-negative finite number".into(),
            });
        }
        Ok(())
    }
}

/// Trained latent vectors for one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorModel {
    /// Latent dimension.
    pub rank: usize,
    /// Item id → rank-`k` vector.
    pub item_factors: HashMap<ItemId, Vec<f32>>,
    /// Basket id → rank-`k` vector.
    pub basket_factors: HashMap<BasketId, Vec<f32>>,
}

impl FactorModel {
    /// Factor vector of `item`, if it appeared in the training matrix.
    pub fn item_vector(&self, item: &ItemId) -> Option<&[f32]> {
        self.item_factors.get(item).map(Vec::as_slice)
    }

    /// Factor vector of `basket`, if it appeared in the training matrix.
    pub fn basket_vector(&self, basket: &BasketId) -> Option<&[f32]> {
        self.basket_factors.get(basket).map(Vec::as_slice)
    }
}

/// Outcome summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Latent rank used.
    pub rank: usize,
    /// Iterations actually run.
    pub iterations_run: usize,
    /// RMSE over observed memberships after the last iteration.
    pub final_rmse: f64,
    /// Whether the tolerance was reached within the budget.
    pub converged: bool,
    /// Baskets factorized.
    pub basket_count: usize,
    /// Items factorized.
    pub item_count: usize,
    /// Observed memberships (non-zero matrix entries).
    pub nonzeros: usize,
    /// Wall-clock training time in milliseconds.
    pub duration_ms: u64,
    /// Completion timestamp, UTC.
    pub trained_at: DateTime<Utc>,
}

/// Alternating-least-squares factor trainer.
#[derive(Debug, Clone, Default)]
pub struct FactorTrainer {
    config: FactorConfig,
}

impl FactorTrainer {
    /// Trainer with the given configuration.
    pub fn new(config: FactorConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &FactorConfig {
        &self.config
    }

    /// Factorize `matrix` into basket and item latent vectors.
    ///
    /// Runs to completion (or early convergence) or fails fast: a
    /// non-finite objective or a collapsed solve yields
    /// [`TrainingError::NonConvergence`] rather than zero vectors. Each
    /// iteration costs O(nnz·k² + (B + I)·k³); per-row solves run on the
    /// rayon pool.
    pub fn train(
        &self,
        matrix: &InteractionMatrix,
    ) -> Result<(FactorModel, TrainingReport), TrainingError> {
        self.config.validate()?;
        if matrix.is_empty() {
            return Err(TrainingError::EmptyMatrix);
        }

        let started = Instant::now();
        let k = self.config.rank;

        // Sorted id lists fix the index assignment regardless of hash order.
        let mut basket_ids: Vec<BasketId> = matrix.baskets().keys().cloned().collect();
        basket_ids.sort_unstable();
        let mut item_ids: Vec<ItemId> = matrix.popularity_counts().keys().cloned().collect();
        item_ids.sort_unstable();

        let item_index: HashMap<&ItemId, usize> =
            item_ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

        let basket_members: Vec<Vec<usize>> = basket_ids
            .iter()
            .map(|b| {
                matrix
                    .baskets()
                    .get(b)
                    .map(|items| items.iter().map(|i| item_index[i]).collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut item_members: Vec<Vec<usize>> = vec![Vec::new(); item_ids.len()];
        for (b_idx, members) in basket_members.iter().enumerate() {
            for &i_idx in members {
                item_members[i_idx].push(b_idx);
            }
        }

        let nonzeros = matrix.nonzeros();
        let reg = self.config.regularization;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let scale = 1.0 / (k as f32).sqrt();
        let mut item_factors: Vec<Vec<f32>> = item_ids
            .iter()
            .map(|_| (0..k).map(|_| (rng.gen::<f32>() - 0.5) * scale).collect())
            .collect();
        let mut basket_factors: Vec<Vec<f32>> = vec![vec![0.0; k]; basket_ids.len()];

        let mut prev_rmse = f64::INFINITY;
        let mut converged = false;
        let mut iterations_run = 0;
        let mut final_rmse = f64::NAN;

        for iteration in 1..=self.config.iterations {
            basket_factors = solve_side(&basket_members, &item_factors, k, reg)
                .map_err(|_| TrainingError::NonConvergence { iteration })?;
            item_factors = solve_side(&item_members, &basket_factors, k, reg)
                .map_err(|_| TrainingError::NonConvergence { iteration })?;

            let rmse = observed_rmse(&basket_members, &basket_factors, &item_factors, nonzeros);
            if !rmse.is_finite() {
                return Err(TrainingError::NonConvergence { iteration });
            }
            debug!(iteration, rmse, "als iteration complete");

            iterations_run = iteration;
            final_rmse = rmse;
            if (prev_rmse - rmse).abs() < self.config.tolerance {
                converged = true;
                break;
            }
            prev_rmse = rmse;
        }

        let model = FactorModel {
            rank: k,
            item_factors: item_ids.into_iter().zip(item_factors).collect(),
            basket_factors: basket_ids.into_iter().zip(basket_factors).collect(),
        };

        let report = TrainingReport {
            rank: k,
            iterations_run,
            final_rmse,
            converged,
            basket_count: model.basket_factors.len(),
            item_count: model.item_factors.len(),
            nonzeros,
            duration_ms: started.elapsed().as_millis() as u64,
            trained_at: Utc::now(),
        };

        info!(
            rank = k,
            iterations = iterations_run,
            rmse = final_rmse,
            converged,
            "factor training complete"
        );

        Ok((model, report))
    }
}

/// Solve one side of the alternation: for every row, fit its vector to the
/// fixed factors of its members under ridge regularization.
fn solve_side(
    rows: &[Vec<usize>],
    fixed: &[Vec<f32>],
    k: usize,
    reg: f64,
) -> Result<Vec<Vec<f32>>, ()> {
    rows.par_iter()
        .map(|members| solve_ridge_row(members, fixed, k, reg))
        .collect()
}

/// RMSE of the reconstruction over observed memberships only.
///
/// Summed sequentially: a parallel reduction would make the accumulation
/// order, and with it the convergence cutoff, run-dependent.
fn observed_rmse(
    basket_members: &[Vec<usize>],
    basket_factors: &[Vec<f32>],
    item_factors: &[Vec<f32>],
    nonzeros: usize,
) -> f64 {
    if nonzeros == 0 {
        return 0.0;
    }
    let sse: f64 = basket_members
        .iter()
        .enumerate()
        .map(|(b_idx, members)| {
            let bf = &basket_factors[b_idx];
            members
                .iter()
                .map(|&i_idx| {
                    let dot: f32 = bf
                        .iter()
                        .zip(item_factors[i_idx].iter())
                        .map(|(x, y)| x * y)
                        .sum();
                    let err = 1.0 - f64::from(dot);
                    err * err
                })
                .sum::<f64>()
        })
        .sum();
    (sse / nonzeros as f64).sqrt()
}
