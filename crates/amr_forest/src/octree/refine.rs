//! Level-field driven refinement.
//!
//! A node at `target_level` refines when its bounds are still subdivisible,
//! `target_level < max_level`, and the level field asks for more depth:
//!
//! - [`RefinePolicy::FullNodes`]: any covered cell at or above
//!   `target_level` creates all `k^d` children.
//! - [`RefinePolicy::PerChild`]: each child's own sub-range is tested and
//!   only the requesting children are created.

use super::config::RefinePolicy;
use super::level_field::{LevelField, NodeBounds};
use super::node::NodeId;
use super::tree::Octree;

impl Octree {
  /// Refine the whole tree from `field`, using the tree's policy.
  ///
  /// Returns the depth (in levels) created below the root.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "octree::refine"))]
  pub fn refine(&mut self, field: &LevelField, max_level: i32) -> i32 {
    let root = self.root();
    let bounds = field.bounds();
    self.refine_node(root, field, bounds, self.level(root), max_level, self.policy())
  }

  /// Refine `id`, which covers `bounds` of `field` and sits at
  /// `target_level`.
  ///
  /// Returns the maximum additional depth created below `id`, 0 when
  /// nothing was refined.
  pub fn refine_node(
    &mut self,
    id: NodeId,
    field: &LevelField,
    bounds: NodeBounds,
    target_level: i32,
    max_level: i32,
    policy: RefinePolicy,
  ) -> i32 {
    let shape = self.shape();
    let (k, rank) = (shape.branching(), shape.rank());
    if target_level >= max_level || !bounds.is_subdivisible(k, rank) {
      return 0;
    }

    let mut refined = false;
    let mut deepest = 0;
    let child_level = target_level + shape.increment();
    let create_all = policy.is_full() && field.requests_at(&bounds, target_level);

    for slot in 0..shape.num_children() {
      let child_bounds = bounds.split(k, rank, shape.child_coords(slot));
      let wanted = create_all
        || (!policy.is_full() && field.requests_at(&child_bounds, target_level));
      if !wanted {
        continue;
      }
      let child = self.create_child(id, slot);
      refined = true;
      let depth = self.refine_node(child, field, child_bounds, child_level, max_level, policy);
      deepest = deepest.max(depth);
    }

    if refined {
      deepest + shape.increment()
    } else {
      0
    }
  }
}

#[cfg(test)]
#[path = "refine_test.rs"]
mod refine_test;
