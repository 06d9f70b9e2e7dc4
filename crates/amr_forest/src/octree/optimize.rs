//! Coalescing of uniformly refined subtrees.
//!
//! When all `k^d` children of a node are leaves with the same
//! `level_adjust`, the children are deleted and the node records the depth
//! they represented:
//!
//! ```text
//! level_adjust(node) += log2(k) + level_adjust(child)
//! ```

use super::node::NodeId;
use super::tree::Octree;

impl Octree {
  /// Repeat [`optimize_pass`](Self::optimize_pass) until nothing changes.
  ///
  /// Returns the number of passes that coalesced something.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "octree::optimize"))]
  pub fn optimize(&mut self) -> usize {
    let mut passes = 0;
    while self.optimize_pass() {
      passes += 1;
    }
    passes
  }

  /// One bottom-up sweep. Returns whether any node was coalesced.
  pub fn optimize_pass(&mut self) -> bool {
    let mut changed = false;
    let root = self.root();
    self.optimize_node(root, &mut changed);
    changed
  }

  fn optimize_node(&mut self, id: NodeId, changed: &mut bool) {
    if self.is_leaf(id) {
      return;
    }
    let children: Vec<NodeId> = self.children(id).map(|(_, child)| child).collect();
    let complete = children.len() == self.shape().num_children();
    let uniform = complete
      && children.iter().all(|&child| self.is_leaf(child))
      && children
        .windows(2)
        .all(|pair| self.level_adjust(pair[0]) == self.level_adjust(pair[1]));

    if uniform {
      let child_adjust = self.level_adjust(children[0]);
      let increment = self.shape().increment();
      self.delete_children(id);
      self.node_mut(id).level_adjust += increment + child_adjust;
      *changed = true;
    } else {
      for child in children {
        self.optimize_node(child, changed);
      }
    }
  }
}

#[cfg(test)]
#[path = "optimize_test.rs"]
mod optimize_test;
