//! ForestConfig - user-facing forest configuration and its validated layout.
//!
//! The config is plain data (deserializable from TOML); [`ForestConfig::validate`]
//! turns it into a [`ForestLayout`] with derived block sizes, or reports the
//! first configuration fault.

use glam::DVec3;
use serde::Deserialize;

use crate::bounds::DAabb3;
use crate::constants::{INDEX_MAX_ARRAY, INDEX_MAX_LEVEL, MAX_RANK};
use crate::error::{ForestError, Result};
use crate::index::ForestIndex;

/// Treatment of the domain edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
  /// Opposite edges are neighbors.
  #[default]
  Periodic,
  /// Zero-gradient: ghost cells copy the nearest interior cell.
  Outflow,
}

/// Forest configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
  /// Number of spatial axes (1..=3).
  pub rank: usize,
  /// Root blocks per axis.
  pub root_blocks: [usize; 3],
  /// Level-0 cells per axis across the whole domain.
  pub domain_cells: [usize; 3],
  /// Ghost layers on each active axis.
  pub ghost_depth: usize,
  /// Deepest level adaptation may reach.
  pub max_level: i32,
  /// Domain edge treatment.
  pub boundary: BoundaryKind,
  /// Field names, in storage order.
  pub fields: Vec<String>,
  /// Domain lower corner.
  pub lower: DVec3,
  /// Domain upper corner.
  pub upper: DVec3,
  /// Worker threads for the actor pool (0 = one per core).
  pub workers: usize,
  /// Smallest boundary element exchanged during refresh
  /// (0 = faces, edges and corners; rank - 1 = faces only).
  pub refresh_min_face_rank: usize,
}

impl Default for ForestConfig {
  fn default() -> Self {
    Self {
      rank: 2,
      root_blocks: [2, 2, 1],
      domain_cells: [16, 16, 1],
      ghost_depth: 2,
      max_level: 3,
      boundary: BoundaryKind::Periodic,
      fields: vec!["density".to_string()],
      lower: DVec3::ZERO,
      upper: DVec3::ONE,
      workers: 0,
      refresh_min_face_rank: 0,
    }
  }
}

impl ForestConfig {
  /// Check the configuration and derive the block layout.
  pub fn validate(&self) -> Result<ForestLayout> {
    if !(1..=MAX_RANK).contains(&self.rank) {
      return Err(ForestError::InvalidRank(self.rank));
    }
    if !(0..=INDEX_MAX_LEVEL).contains(&self.max_level) {
      return Err(ForestError::LevelOutOfRange(self.max_level, INDEX_MAX_LEVEL));
    }
    if self.fields.is_empty() {
      return Err(ForestError::NoFields);
    }

    let mut root_blocks = [1u32; 3];
    let mut block_size = [1usize; 3];
    let mut ghost = [0usize; 3];
    for axis in 0..self.rank {
      let (blocks, cells) = (self.root_blocks[axis], self.domain_cells[axis]);
      if blocks == 0 || blocks > INDEX_MAX_ARRAY as usize {
        return Err(ForestError::TooManyRootBlocks {
          axis,
          blocks,
          limit: INDEX_MAX_ARRAY,
        });
      }
      if cells == 0 || cells % blocks != 0 {
        return Err(ForestError::IndivisibleDomain { axis, cells, blocks });
      }
      let size = cells / blocks;
      if size % 2 != 0 || size < 2 * self.ghost_depth.max(1) {
        return Err(ForestError::InvalidBlockSize {
          axis,
          size,
          ghost: self.ghost_depth,
        });
      }
      root_blocks[axis] = blocks as u32;
      block_size[axis] = size;
      ghost[axis] = self.ghost_depth;
    }

    let mut lower = self.lower;
    let mut upper = self.upper;
    for axis in 0..MAX_RANK {
      if axis >= self.rank {
        lower[axis] = 0.0;
        upper[axis] = upper[axis].max(lower[axis] + 1.0);
      } else if lower[axis] >= upper[axis] {
        return Err(ForestError::InvalidDomainBounds);
      }
    }

    let periodic = matches!(self.boundary, BoundaryKind::Periodic);
    Ok(ForestLayout {
      rank: self.rank,
      root_blocks,
      block_size,
      ghost,
      max_level: self.max_level,
      periodic: [0, 1, 2].map(|axis| periodic && axis < self.rank),
      boundary: self.boundary,
      domain: DAabb3::new(lower, upper),
      field_count: self.fields.len(),
      refresh_min_face_rank: self.refresh_min_face_rank.min(self.rank - 1),
      workers: self.workers,
    })
  }
}

/// Validated forest geometry shared by every block.
#[derive(Clone, Debug, PartialEq)]
pub struct ForestLayout {
  pub rank: usize,
  pub root_blocks: [u32; 3],
  pub block_size: [usize; 3],
  pub ghost: [usize; 3],
  pub max_level: i32,
  pub periodic: [bool; 3],
  pub boundary: BoundaryKind,
  pub domain: DAabb3,
  pub field_count: usize,
  pub refresh_min_face_rank: usize,
  pub workers: usize,
}

impl ForestLayout {
  /// Spatial region covered by the block at `index`.
  pub fn block_bounds(&self, index: &ForestIndex) -> DAabb3 {
    let level = index.level() as u32;
    let counts = [0, 1, 2].map(|a| (self.root_blocks[a] as u64) << if a < self.rank { level } else { 0 });
    let coords = [0, 1, 2].map(|a| if a < self.rank { index.coordinate(a) } else { 0 });
    self.domain.grid_cell(counts, coords)
  }

  /// Center of an interior-relative cell of the block at `index`.
  pub fn cell_center(&self, index: &ForestIndex, cell: [isize; 3]) -> DVec3 {
    let bounds = self.block_bounds(index);
    let size = bounds.size();
    let mut center = bounds.min;
    for axis in 0..3 {
      let h = size[axis] / self.block_size[axis] as f64;
      center[axis] += (cell[axis] as f64 + 0.5) * h;
    }
    center
  }

  /// Every root index in array order.
  pub fn root_indices(&self) -> Vec<ForestIndex> {
    let [nx, ny, nz] = self.root_blocks;
    let mut roots = Vec::with_capacity((nx * ny * nz) as usize);
    for z in 0..nz {
      for y in 0..ny {
        for x in 0..nx {
          roots.push(ForestIndex::new(x, y, z));
        }
      }
    }
    roots
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
