//! TreeConfig - branching factor, rank and refinement policy for one octree.

use serde::Deserialize;

use crate::constants::{MAX_RANK, SUPPORTED_BRANCHING};
use crate::error::{ForestError, Result};

/// How `refine` decides which children to create.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinePolicy {
  /// A node refines into all `k^d` children when any covered cell asks for it.
  #[default]
  FullNodes,
  /// Each prospective child is tested against its own sub-region and only the
  /// requesting children are created.
  PerChild,
}

impl RefinePolicy {
  #[inline]
  pub fn is_full(self) -> bool {
    matches!(self, RefinePolicy::FullNodes)
  }
}

/// Configuration for a single k^d-ary tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
  /// Children per axis; one of 2, 4, 8, 16.
  pub branching: usize,
  /// Number of spatial axes (1..=3).
  pub rank: usize,
  /// Refinement policy shared by `refine` and `balance`.
  pub policy: RefinePolicy,
}

impl TreeConfig {
  /// Binary tree per axis: quadtree in 2-D, octree in 3-D.
  pub const OCTREE: Self = Self {
    branching: 2,
    rank: 3,
    policy: RefinePolicy::FullNodes,
  };

  pub fn new(branching: usize, rank: usize, policy: RefinePolicy) -> Self {
    Self {
      branching,
      rank,
      policy,
    }
  }

  /// Check the branching factor and rank, returning the derived shape.
  pub fn validate(&self) -> Result<TreeShape> {
    if !SUPPORTED_BRANCHING.contains(&self.branching) {
      return Err(ForestError::InvalidBranching(self.branching));
    }
    if !(1..=MAX_RANK).contains(&self.rank) {
      return Err(ForestError::InvalidRank(self.rank));
    }
    Ok(TreeShape {
      k: self.branching,
      rank: self.rank,
      increment: self.branching.trailing_zeros() as i32,
    })
  }
}

impl Default for TreeConfig {
  fn default() -> Self {
    Self::OCTREE
  }
}

/// Validated geometry of a tree: branching, rank and level increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeShape {
  k: usize,
  rank: usize,
  increment: i32,
}

impl TreeShape {
  #[inline]
  pub fn branching(&self) -> usize {
    self.k
  }

  #[inline]
  pub fn rank(&self) -> usize {
    self.rank
  }

  /// Levels gained per refinement: `log2 k`.
  #[inline]
  pub fn increment(&self) -> i32 {
    self.increment
  }

  /// Number of child slots, `k^d`.
  #[inline]
  pub fn num_children(&self) -> usize {
    self.k.pow(self.rank as u32)
  }

  /// Slot number for per-axis child coordinates (x fastest).
  #[inline]
  pub fn child_slot(&self, coords: [usize; 3]) -> usize {
    debug_assert!(coords.iter().take(self.rank).all(|&c| c < self.k));
    coords[0] + self.k * (coords[1] + self.k * coords[2])
  }

  /// Per-axis child coordinates for a slot number.
  ///
  /// # Panics
  /// Panics when `slot` is out of range.
  #[inline]
  pub fn child_coords(&self, slot: usize) -> [usize; 3] {
    assert!(slot < self.num_children(), "child slot {slot} out of range");
    [slot % self.k, (slot / self.k) % self.k, slot / (self.k * self.k)]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_supported_branching_increments() {
    for (k, increment) in [(2, 1), (4, 2), (8, 3), (16, 4)] {
      let shape = TreeConfig::new(k, 2, RefinePolicy::FullNodes).validate().unwrap();
      assert_eq!(shape.increment(), increment);
      assert_eq!(shape.num_children(), k * k);
    }
  }

  #[test]
  fn test_unsupported_branching_rejected() {
    for k in [0, 1, 3, 6, 32] {
      let err = TreeConfig::new(k, 3, RefinePolicy::FullNodes).validate().unwrap_err();
      assert_eq!(err, ForestError::InvalidBranching(k));
    }
    let err = TreeConfig::new(2, 4, RefinePolicy::FullNodes).validate().unwrap_err();
    assert_eq!(err, ForestError::InvalidRank(4));
  }

  #[test]
  fn test_child_slot_roundtrip() {
    let shape = TreeConfig::new(4, 3, RefinePolicy::PerChild).validate().unwrap();
    for slot in 0..shape.num_children() {
      assert_eq!(shape.child_slot(shape.child_coords(slot)), slot);
    }
  }
}
