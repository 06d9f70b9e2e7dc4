//! Forest - the driver that owns the actor runtime and runs whole rounds.
//!
//! Each round is two broadcasts separated by quiescence:
//!
//! ```text
//! adapt:    BeginAdapt ─► wait_idle ─► CommitAdapt ─► wait_idle
//! refresh:  BeginRefresh ─► wait_idle
//! ```
//!
//! Between rounds nothing is in flight, so the driver may read and write
//! block data directly (solver updates, snapshots, consistency checks).

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use web_time::Instant;

use crate::block::{Block, BlockContext, FaceLevels, Message};
use crate::bounds::DAabb3;
use crate::config::{ForestConfig, ForestLayout};
use crate::criterion::{InitialCondition, RefineCriterion};
use crate::error::Result;
use crate::faces::{ChildOffset, FaceOffset};
use crate::field::FieldBlock;
use crate::index::ForestIndex;
use crate::metrics::ForestMetrics;
use crate::runtime::{CounterSnapshot, Runtime};
use crate::stats::{AdaptStats, RefreshStats};

/// Read-only description of one leaf, as handed to solvers and writers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafInfo {
  pub index: ForestIndex,
  pub level: i32,
  pub bounds: DAabb3,
  pub cycle: u64,
  pub time: f64,
}

/// A leaf whose neighbor table disagrees with the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceLevelMismatch {
  pub index: ForestIndex,
  pub face: FaceOffset,
  pub recorded: Option<i32>,
  pub actual: Option<i32>,
}

/// The mesh: every block of every root tree, plus cycle bookkeeping.
pub struct Forest {
  runtime: Runtime,
  cycle: u64,
  time: f64,
  metrics: ForestMetrics,
}

impl Forest {
  /// Validate `config`, start the actor pool and create the root blocks.
  pub fn new(
    config: &ForestConfig,
    criterion: Arc<dyn RefineCriterion>,
    initial: Option<Arc<dyn InitialCondition>>,
  ) -> Result<Self> {
    let layout = config.validate()?;
    let workers = layout.workers;
    let context = BlockContext::new(layout, criterion, initial);
    let runtime = Runtime::new(context, workers)?;

    let roots = runtime.context().layout.root_indices();
    for index in &roots {
      let ctx = runtime.context();
      let block = Block::new(*index, ctx.initial_data(index), ctx.uniform_face_levels(index));
      runtime.spawn(block);
    }
    tracing::info!(
      roots = roots.len(),
      threads = runtime.num_threads(),
      block_size = ?runtime.context().layout.block_size,
      "forest created"
    );

    Ok(Self {
      runtime,
      cycle: 0,
      time: 0.0,
      metrics: ForestMetrics::new(),
    })
  }

  #[inline]
  pub fn layout(&self) -> &ForestLayout {
    &self.runtime.context().layout
  }

  #[inline]
  pub fn cycle(&self) -> u64 {
    self.cycle
  }

  #[inline]
  pub fn time(&self) -> f64 {
    self.time
  }

  pub fn metrics(&self) -> &ForestMetrics {
    &self.metrics
  }

  /// Move to the next cycle.
  pub fn advance(&mut self, dt: f64) {
    self.cycle += 1;
    self.time += dt;
  }

  /// Blocks of every level, leaves and interior.
  pub fn num_blocks(&self) -> usize {
    self.runtime.len()
  }

  pub fn num_leaves(&self) -> usize {
    let mut leaves = 0;
    self.runtime.for_each_block(|block| leaves += block.is_leaf() as usize);
    leaves
  }

  /// Counters accumulated since the forest was created.
  pub fn counters(&self) -> CounterSnapshot {
    self.runtime.counters()
  }

  // =========================================================================
  // Rounds
  // =========================================================================

  /// Refine from the initial condition until the mesh stops changing.
  /// Never coarsens; takes at most `max_level` changing rounds.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "forest::initial_mesh"))]
  pub fn build_initial_mesh(&mut self) -> Vec<AdaptStats> {
    let mut rounds = Vec::new();
    for _ in 0..=self.layout().max_level {
      let stats = self.adapt_round(true);
      rounds.push(stats);
      if !stats.changed() {
        break;
      }
    }
    tracing::info!(
      rounds = rounds.len(),
      leaves = rounds.last().map(|s| s.leaves).unwrap_or_default(),
      "initial mesh built"
    );
    rounds
  }

  /// One adaptation round driven by the refinement criterion.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "forest::adapt"))]
  pub fn adapt(&mut self) -> AdaptStats {
    self.adapt_round(false)
  }

  fn adapt_round(&mut self, initial: bool) -> AdaptStats {
    let start = Instant::now();
    let before = self.runtime.counters();

    self.runtime.broadcast(Message::BeginAdapt { initial });
    self.runtime.wait_idle();
    self.runtime.broadcast(Message::CommitAdapt);
    self.runtime.wait_idle();

    let delta = self.runtime.counters().since(&before);
    let mut stats = AdaptStats::from_counters(&delta, 1 << self.layout().rank);
    stats.initial = initial;
    stats.leaves = self.num_leaves();
    stats.blocks = self.num_blocks();
    stats.elapsed_us = start.elapsed().as_micros() as u64;

    tracing::debug!(
      cycle = self.cycle,
      initial,
      notices = stats.notices,
      refined = stats.refined,
      coarsened = stats.coarsened,
      leaves = stats.leaves,
      elapsed_us = stats.elapsed_us,
      "adapt round"
    );
    self.metrics.record_adapt(&stats);
    stats
  }

  /// Exchange ghost zones between every pair of neighboring leaves.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "forest::refresh"))]
  pub fn refresh(&mut self) -> RefreshStats {
    let start = Instant::now();
    let before = self.runtime.counters();
    let completed_before = self.refreshes_completed();

    self.runtime.broadcast(Message::BeginRefresh);
    self.runtime.wait_idle();

    let delta = self.runtime.counters().since(&before);
    let mut stats = RefreshStats::from_counters(&delta);
    stats.completed = (self.refreshes_completed() - completed_before) as usize;
    stats.leaves = self.num_leaves();
    stats.elapsed_us = start.elapsed().as_micros() as u64;

    if stats.completed != stats.leaves {
      tracing::warn!(
        completed = stats.completed,
        leaves = stats.leaves,
        "refresh finished with incomplete leaves"
      );
    }
    tracing::debug!(
      cycle = self.cycle,
      copies = stats.copies,
      restricts = stats.restricts,
      prolongs = stats.prolongs,
      elapsed_us = stats.elapsed_us,
      "refresh"
    );
    self.metrics.record_refresh(&stats);
    stats
  }

  fn refreshes_completed(&self) -> u64 {
    let mut total = 0;
    self.runtime.for_each_block(|block| total += block.refreshes_completed());
    total
  }

  // =========================================================================
  // Leaf Access
  // =========================================================================

  fn leaf_info(&self, block: &Block) -> LeafInfo {
    LeafInfo {
      index: *block.index(),
      level: block.level(),
      bounds: self.layout().block_bounds(block.index()),
      cycle: self.cycle,
      time: self.time,
    }
  }

  /// Every leaf in index order.
  pub fn leaves(&self) -> Vec<LeafInfo> {
    let mut leaves = Vec::new();
    self.runtime.for_each_block(|block| {
      if block.is_leaf() {
        leaves.push(self.leaf_info(block));
      }
    });
    leaves
  }

  /// Visit every leaf with its field data, in index order.
  pub fn for_each_leaf(&self, mut f: impl FnMut(&LeafInfo, &FieldBlock)) {
    self.runtime.for_each_block(|block| {
      if block.is_leaf() {
        f(&self.leaf_info(block), block.data());
      }
    });
  }

  /// Update every leaf's field data in parallel.
  pub fn update_leaves(&mut self, f: impl Fn(&LeafInfo, &mut FieldBlock) + Sync) {
    let indices = self.runtime.indices();
    indices.par_iter().for_each(|index| {
      self.runtime.with_block_mut(index, |block| {
        if block.is_leaf() {
          let info = self.leaf_info(block);
          f(&info, block.data_mut());
        }
      });
    });
  }

  /// Face table of one block, if it exists.
  pub fn face_levels(&self, index: &ForestIndex) -> Option<FaceLevels> {
    self.runtime.with_block(index, |block| *block.face_levels())
  }

  // =========================================================================
  // Consistency Checks
  // =========================================================================

  /// Leaf pairs across a face, edge or corner whose levels differ by more
  /// than one. Empty on a balanced mesh.
  pub fn balance_violations(&self) -> Vec<(ForestIndex, ForestIndex)> {
    let mesh = MeshShape::capture(&self.runtime);
    let ctx = self.runtime.context();
    let mut violations = Vec::new();
    for leaf in mesh.leaves() {
      for face in ctx.neighbors.iter() {
        if ctx.is_boundary(&leaf, face) {
          continue;
        }
        for other in mesh.leaves_toward(&leaf, face, ctx) {
          if (other.level() - leaf.level()).abs() > 1 {
            violations.push((leaf, other));
          }
        }
      }
    }
    violations
  }

  /// Leaf table entries that do not hold the finest leaf level across
  /// their direction.
  pub fn face_level_mismatches(&self) -> Vec<FaceLevelMismatch> {
    let mesh = MeshShape::capture(&self.runtime);
    let ctx = self.runtime.context();
    let mut mismatches = Vec::new();
    for leaf in mesh.leaves() {
      let Some(table) = self.face_levels(&leaf) else {
        continue;
      };
      for face in ctx.neighbors.iter() {
        let actual = if ctx.is_boundary(&leaf, face) {
          None
        } else {
          mesh.leaves_toward(&leaf, face, ctx).iter().map(|l| l.level()).max()
        };
        let recorded = table[face.slot()];
        if recorded != actual {
          mismatches.push(FaceLevelMismatch {
            index: leaf,
            face,
            recorded,
            actual,
          });
        }
      }
    }
    mismatches
  }
}

/// Topology snapshot: which blocks exist and which of them are leaves.
struct MeshShape {
  blocks: HashMap<ForestIndex, bool>,
}

impl MeshShape {
  fn capture(runtime: &Runtime) -> Self {
    let mut blocks = HashMap::new();
    runtime.for_each_block(|block| {
      blocks.insert(*block.index(), block.is_leaf());
    });
    Self { blocks }
  }

  fn leaves(&self) -> Vec<ForestIndex> {
    let mut leaves: Vec<ForestIndex> = self
      .blocks
      .iter()
      .filter(|(_, leaf)| **leaf)
      .map(|(index, _)| *index)
      .collect();
    leaves.sort_unstable();
    leaves
  }

  /// Leaves touching `index` across `face`.
  fn leaves_toward(&self, index: &ForestIndex, face: FaceOffset, ctx: &BlockContext) -> Vec<ForestIndex> {
    let mut location = ctx.neighbor(index, face);
    if self.blocks.contains_key(&location) {
      let mut found = Vec::new();
      self.collect_leaves(location, -face, ctx.rank(), &mut found);
      return found;
    }
    while location.level() > 0 {
      location = location.index_parent();
      if self.blocks.get(&location) == Some(&true) {
        return vec![location];
      }
    }
    Vec::new()
  }

  /// Leaves under `index` on its side facing `side`.
  fn collect_leaves(&self, index: ForestIndex, side: FaceOffset, rank: usize, found: &mut Vec<ForestIndex>) {
    match self.blocks.get(&index) {
      Some(true) => found.push(index),
      Some(false) => {
        for child in ChildOffset::adjacent_to(rank, side) {
          self.collect_leaves(index.index_child(child), side, rank, found);
        }
      }
      None => {}
    }
  }
}

#[cfg(test)]
#[path = "forest_test.rs"]
mod forest_test;
