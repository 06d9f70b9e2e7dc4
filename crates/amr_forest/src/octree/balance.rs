//! 2:1 balance.
//!
//! A leaf is refined when a same-level cousin (a child of a face, edge or
//! corner neighbor, on the side facing the leaf) has children of its own,
//! since those grandchildren sit two refinement steps below the leaf.
//! Each pass can only add nodes, so repeating passes reaches a fixed point.

use crate::faces::{Face, FaceOffset, FaceOffsets};

use super::config::RefinePolicy;
use super::node::NodeId;
use super::tree::Octree;

impl Octree {
  /// Repeat [`balance_pass`](Self::balance_pass) until nothing changes.
  ///
  /// Returns the number of passes that refined something.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "octree::balance"))]
  pub fn balance(&mut self) -> usize {
    let mut passes = 0;
    while self.balance_pass(self.policy()) {
      passes += 1;
    }
    tracing::trace!(passes, nodes = self.num_nodes(), "balance converged");
    passes
  }

  /// One sweep of the 2:1 rule. Returns whether anything was refined.
  pub fn balance_pass(&mut self, policy: RefinePolicy) -> bool {
    let offsets = FaceOffsets::all(self.shape().rank());
    let mut refined = false;
    let root = self.root();
    self.balance_node(root, policy, &offsets, &mut refined);
    refined
  }

  fn balance_node(
    &mut self,
    id: NodeId,
    policy: RefinePolicy,
    offsets: &FaceOffsets,
    refined: &mut bool,
  ) {
    let shape = self.shape();
    if policy.is_full() {
      if self.is_leaf(id) && self.leaf_needs_refinement(id, offsets) {
        self.create_children(id);
        *refined = true;
      }
    } else {
      for slot in 0..shape.num_children() {
        if self.child(id, slot).is_none() && self.child_needs_creation(id, slot) {
          self.create_child(id, slot);
          *refined = true;
        }
      }
    }

    let children: Vec<NodeId> = self.children(id).map(|(_, child)| child).collect();
    for child in children {
      self.balance_node(child, policy, offsets, refined);
    }
  }

  /// Whether some neighbor's facing child already has children.
  fn leaf_needs_refinement(&self, id: NodeId, offsets: &FaceOffsets) -> bool {
    offsets.iter().any(|offset| {
      self
        .neighbor_at(id, offset)
        .is_some_and(|neighbor| self.facing_children_refined(neighbor, -offset))
    })
  }

  /// Whether any child of `node` on its `side` boundary has children.
  fn facing_children_refined(&self, node: NodeId, side: FaceOffset) -> bool {
    self.children(node).any(|(slot, child)| {
      self.on_side(slot, side) && self.has_children(child)
    })
  }

  /// Whether child `slot` touches the parent's boundary in direction `side`.
  fn on_side(&self, slot: usize, side: FaceOffset) -> bool {
    let shape = self.shape();
    let coords = shape.child_coords(slot);
    (0..shape.rank()).all(|axis| match side.get(axis) {
      1 => coords[axis] == shape.branching() - 1,
      -1 => coords[axis] == 0,
      _ => true,
    })
  }

  /// Per-child rule: a missing child is still covered by its parent, so it
  /// must exist once a node across one of its faces has children facing it.
  fn child_needs_creation(&self, parent: NodeId, slot: usize) -> bool {
    let shape = self.shape();
    let k = shape.branching();
    let coords = shape.child_coords(slot);
    Face::all(shape.rank()).any(|face| {
      let axis = face.axis();
      let mut across = coords;
      let inside = if face.is_upper() {
        coords[axis] + 1 < k
      } else {
        coords[axis] > 0
      };
      let adjacent = if inside {
        across[axis] = if face.is_upper() { coords[axis] + 1 } else { coords[axis] - 1 };
        self.child(parent, shape.child_slot(across))
      } else {
        across[axis] = if face.is_upper() { 0 } else { k - 1 };
        self.cousin(parent, face, shape.child_slot(across))
      };
      adjacent.is_some_and(|node| self.facing_children_exist(node, face.opposite().offset()))
    })
  }

  fn facing_children_exist(&self, node: NodeId, side: FaceOffset) -> bool {
    self.children(node).any(|(slot, _)| self.on_side(slot, side))
  }
}

#[cfg(test)]
#[path = "balance_test.rs"]
mod balance_test;
