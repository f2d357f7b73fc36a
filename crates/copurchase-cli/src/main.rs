//! Copurchase CLI.
//!
//! Operator tooling around the recommendation engine: ingest a CSV order
//! export (`order_id,item_name`), train in-process, then answer one query:
//! recommendations for an anchor, the popularity ranking, or per-item
//! statistics. Reports and results print as JSON for piping.
//!
//! # Commands
//!
//! - `train`: ingest + train, print the full retrain report
//! - `recommend`: recommendations for `--item`, `--basket-id`, or `--basket`
//! - `popular`: top items by basket membership
//! - `stats`: popularity and co-purchase statistics for one item

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use copurchase_core::embedder::HashEmbedder;
use copurchase_core::engine::{EngineConfig, RecommendationEngine, RetrainReport};
use copurchase_core::factor::FactorConfig;
use copurchase_core::interaction::RawPair;
use copurchase_core::types::{Anchor, BasketId, ItemId};
use copurchase_core::InMemoryResultCache;

/// Copurchase - hybrid co-purchase recommendations from order exports
#[derive(Parser)]
#[command(name = "copurchase")]
#[command(version)]
#[command(about = "Hybrid co-purchase recommendations from order exports")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// CSV order export with an order_id,item_name header row
    #[arg(short, long, global = true, default_value = "orders.csv")]
    input: PathBuf,

    /// Latent rank for factor training
    #[arg(long, global = true, default_value_t = 32)]
    rank: usize,

    /// Iteration budget for factor training
    #[arg(long, global = true, default_value_t = 15)]
    iterations: usize,

    /// Random seed for factor training
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest and train, printing the retrain report
    Train,
    /// Recommend related items for an anchor
    Recommend {
        /// Anchor item name
        #[arg(long, conflicts_with_all = ["basket", "basket_id"])]
        item: Option<String>,
        /// Anchor basket id from the training data
        #[arg(long = "basket-id", conflicts_with = "basket")]
        basket_id: Option<String>,
        /// Ad-hoc anchor basket as a comma-separated item list
        #[arg(long, value_delimiter = ',')]
        basket: Option<Vec<String>>,
        /// Maximum number of recommendations
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Print the popularity ranking
    Popular {
        /// Maximum number of items
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print statistics for one item
    Stats {
        /// Item name
        #[arg(long)]
        item: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_target(true).init();

    let pairs = read_pairs(&cli.input)?;
    let (engine, report) = train_engine(&cli, pairs).await?;

    match &cli.command {
        Commands::Train => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Recommend {
            item,
            basket_id,
            basket,
            limit,
        } => {
            let anchor = parse_anchor(item.as_deref(), basket_id.as_deref(), basket.as_deref())?;
            let results = engine.recommend(&anchor, *limit).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Popular { limit } => {
            let results = engine.popular(*limit);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Stats { item } => {
            let Some(id) = ItemId::new(item) else {
                bail!("item name is empty after normalization");
            };
            match engine.item_stats(&id) {
                Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
                None => bail!("item not found in training data: {id}"),
            }
        }
    }

    Ok(())
}

/// Read `(order_id, item_name)` pairs from a CSV export.
///
/// Rows that cannot be parsed at the CSV level are skipped with a warning;
/// semantically malformed rows (empty ids) are left to the engine, which
/// accounts for them in the ingest report.
fn read_pairs(path: &PathBuf) -> anyhow::Result<Vec<RawPair>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut pairs = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                warn!(line = idx + 2, error = %err, "skipping unparsable csv row");
                continue;
            }
        };
        let basket = record.get(0).unwrap_or_default();
        let item = record.get(1).unwrap_or_default();
        pairs.push(RawPair::new(basket, item));
    }
    if pairs.is_empty() {
        bail!("no data rows in {}", path.display());
    }
    Ok(pairs)
}

async fn train_engine(
    cli: &Cli,
    pairs: Vec<RawPair>,
) -> anyhow::Result<(RecommendationEngine, RetrainReport)> {
    let config = EngineConfig {
        factor: FactorConfig::default()
            .with_rank(cli.rank)
            .with_iterations(cli.iterations)
            .with_seed(cli.seed),
        ..EngineConfig::default()
    };
    let engine = RecommendationEngine::with_config(
        config,
        Arc::new(HashEmbedder::new()),
        Arc::new(InMemoryResultCache::new()),
    );
    let report = engine
        .retrain(pairs)
        .await
        .context("training the recommendation engine")?;
    Ok((engine, report))
}

fn parse_anchor(
    item: Option<&str>,
    basket_id: Option<&str>,
    basket: Option<&[String]>,
) -> anyhow::Result<Anchor> {
    match (item, basket_id, basket) {
        (Some(name), None, None) => {
            let Some(id) = ItemId::new(name) else {
                bail!("item name is empty after normalization");
            };
            Ok(Anchor::Item(id))
        }
        (None, Some(raw), None) => {
            let Some(id) = BasketId::new(raw) else {
                bail!("basket id is empty");
            };
            Ok(Anchor::Basket(id))
        }
        (None, None, Some(names)) => {
            let items: Vec<ItemId> = names.iter().filter_map(|n| ItemId::new(n)).collect();
            if items.is_empty() {
                bail!("basket contains no valid item names");
            }
            Ok(Anchor::ItemSet(items))
        }
        _ => bail!("exactly one of --item, --basket-id, or --basket is required"),
    }
}
