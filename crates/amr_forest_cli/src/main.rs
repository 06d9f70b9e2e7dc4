//! amr_forest - drive a forest-of-octrees mesh from a TOML configuration.
//!
//! `run` builds the initial mesh around a moving feature and then cycles
//! adapt, refresh and advance; `tree` exercises the standalone k^d-ary tree
//! engine on a rasterized disc.

mod config;

use std::path::PathBuf;

use amr_forest::{AsyncCycle, Forest, LevelField, Octree};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::RunConfig;

/// Forest-of-octrees adaptive mesh driver.
#[derive(Parser, Debug)]
#[command(name = "amr_forest")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to configuration TOML file (defaults apply when absent)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log level (trace, debug, info, warn, error)
  #[arg(long, default_value = "info")]
  log_level: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Build the initial mesh and run adapt/refresh cycles
  Run {
    /// Override the configured cycle count
    #[arg(short = 'n', long)]
    cycles: Option<u32>,
  },

  /// Refine, balance and coalesce a single tree
  Tree,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_target(false))
    .init();

  let config = match &cli.config {
    Some(path) => RunConfig::load(path)?,
    None => RunConfig::default(),
  };

  match cli.command {
    Commands::Run { cycles } => run(&config, cycles.unwrap_or(config.run.cycles)),
    Commands::Tree => tree(&config),
  }
}

fn run(config: &RunConfig, cycles: u32) -> Result<()> {
  let mut forest = Forest::new(&config.forest, config.criterion(), Some(config.initial_condition()))
    .context("Failed to create forest")?;

  let rounds = forest.build_initial_mesh();
  println!(
    "Initial mesh: {} leaves, {} blocks after {} rounds",
    forest.num_leaves(),
    forest.num_blocks(),
    rounds.len()
  );
  forest.refresh();

  let feature = config.feature;
  let layout = forest.layout().clone();
  let mut pipeline = AsyncCycle::new();

  for _ in 0..cycles {
    let time = forest.time();
    forest.update_leaves(|leaf, data| {
      data.fill_interior(0, |cell| feature.value(layout.cell_center(&leaf.index, cell), time));
    });

    let (adapt, refresh) = if config.run.pipelined {
      if pipeline.start(forest, config.run.dt).is_err() {
        anyhow::bail!("cycle pipeline unexpectedly busy");
      }
      let result = pipeline.wait().context("Cycle task ended without a result")?;
      forest = result.forest;
      (result.adapt, result.refresh)
    } else {
      let adapt = forest.adapt();
      let refresh = forest.refresh();
      forest.advance(config.run.dt);
      (adapt, refresh)
    };

    println!(
      "cycle {:>4}  t={:.3}  leaves {:>6}  +{:<4} -{:<4} notices {:>7}  ghosts {:>7}  {:>6}us",
      forest.cycle(),
      forest.time(),
      adapt.leaves,
      adapt.refined,
      adapt.coarsened,
      adapt.notices,
      refresh.buffers(),
      adapt.elapsed_us + refresh.elapsed_us,
    );
  }

  let violations = forest.balance_violations();
  if !violations.is_empty() {
    anyhow::bail!("mesh lost 2:1 balance at {} leaf pairs", violations.len());
  }
  let mismatches = forest.face_level_mismatches();
  if !mismatches.is_empty() {
    anyhow::bail!("{} face table entries disagree with the mesh", mismatches.len());
  }

  let counters = forest.counters();
  tracing::info!(
    leaves = forest.num_leaves(),
    spawned = counters.spawned,
    retired = counters.retired,
    dropped = counters.dropped,
    overlaps = counters.overlaps,
    "run complete"
  );
  if counters.dropped > 0 {
    tracing::warn!(dropped = counters.dropped, "messages reached deleted blocks");
  }
  let metrics = forest.metrics();
  if let Some((min, max)) = metrics.adapt_timings.min_max() {
    tracing::info!(
      adapt_avg_us = metrics.adapt_timings.average(),
      adapt_min_us = min,
      adapt_max_us = max,
      refresh_avg_us = metrics.refresh_timings.average(),
      "round timings"
    );
  }
  Ok(())
}

fn tree(config: &RunConfig) -> Result<()> {
  let settings = config.tree;
  let mut tree = Octree::new(settings.config).context("Invalid tree configuration")?;
  let rank = settings.config.rank;

  // a disc (or ball) of maximum level at the center of the field
  let n = settings.cells;
  let dims = [0, 1, 2].map(|axis| if axis < rank { n } else { 1 });
  let center = n as f64 / 2.0;
  let field = LevelField::from_fn(dims, |cell| {
    let r2: f64 = (0..rank).map(|a| (cell[a] as f64 + 0.5 - center).powi(2)).sum();
    if r2.sqrt() < n as f64 / 4.0 {
      settings.max_level
    } else {
      0
    }
  });

  let depth = tree.refine(&field, settings.max_level);
  let after_refine = tree.stats();
  let balance_passes = tree.balance();
  let after_balance = tree.stats();
  let optimize_passes = tree.optimize();
  let after_optimize = tree.stats();

  println!("refine:   depth {depth}, {} nodes, {} leaves", after_refine.nodes, after_refine.leaves);
  println!(
    "balance:  {balance_passes} passes, {} nodes, {} leaves",
    after_balance.nodes, after_balance.leaves
  );
  println!(
    "optimize: {optimize_passes} passes, {} nodes, {} leaves",
    after_optimize.nodes, after_optimize.leaves
  );
  println!("nodes per level: {:?}", after_optimize.nodes_per_level);

  if !tree.neighbor_symmetry_violations().is_empty() {
    anyhow::bail!("neighbor links are not symmetric");
  }
  Ok(())
}
