//! Per-tree structure statistics.

use super::tree::Octree;

/// Node and leaf counts per level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
  /// Live nodes, interior included.
  pub nodes: usize,
  /// Nodes without children.
  pub leaves: usize,
  /// Deepest structural level present.
  pub max_level: i32,
  /// Node count indexed by level.
  pub nodes_per_level: Vec<usize>,
}

impl TreeStats {
  pub(crate) fn collect(tree: &Octree) -> Self {
    let mut stats = TreeStats::default();
    for id in tree.nodes() {
      let level = tree.level(id);
      stats.nodes += 1;
      if tree.is_leaf(id) {
        stats.leaves += 1;
      }
      stats.max_level = stats.max_level.max(level);
      let slot = level as usize;
      if stats.nodes_per_level.len() <= slot {
        stats.nodes_per_level.resize(slot + 1, 0);
      }
      stats.nodes_per_level[slot] += 1;
    }
    stats
  }

  /// Interior node count.
  #[inline]
  pub fn interior(&self) -> usize {
    self.nodes - self.leaves
  }

  /// Nodes at `level`, zero when none.
  #[inline]
  pub fn at_level(&self, level: i32) -> usize {
    self.nodes_per_level.get(level as usize).copied().unwrap_or(0)
  }
}
