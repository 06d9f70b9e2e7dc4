//! Node handles and arena records.
//!
//! Nodes live in the tree's arena and are named by generational handles.
//! A handle whose slot has been freed (and possibly reused) no longer
//! resolves, so a stale reference is detected instead of dangling.

use crate::constants::MAX_FACES;

/// Handle to a node in an [`Octree`](super::Octree).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId {
  pub(crate) index: u32,
  pub(crate) generation: u32,
}

impl NodeId {
  #[inline]
  pub(crate) fn new(index: u32, generation: u32) -> Self {
    Self { index, generation }
  }

  /// Arena slot, stable for the lifetime of the node.
  #[inline]
  pub fn slot(&self) -> usize {
    self.index as usize
  }
}

/// Structural state of one node.
#[derive(Clone, Debug)]
pub(crate) struct NodeRecord {
  /// Owning parent, `None` for the root.
  pub parent: Option<NodeId>,
  /// Child slots; `None` until the first child is created.
  pub children: Option<Box<[Option<NodeId>]>>,
  /// Same-level face neighbors (weak, kept symmetric).
  pub neighbors: [Option<NodeId>; MAX_FACES],
  /// Extra depth absorbed by coalescing uniform subtrees.
  pub level_adjust: i32,
  /// Refinement level (depth times the level increment).
  pub level: i32,
  /// Integer position among all nodes of the same depth.
  pub origin: [u32; 3],
}

impl NodeRecord {
  pub fn root() -> Self {
    Self {
      parent: None,
      children: None,
      neighbors: [None; MAX_FACES],
      level_adjust: 0,
      level: 0,
      origin: [0; 3],
    }
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self
      .children
      .as_ref()
      .map_or(true, |slots| slots.iter().all(Option::is_none))
  }
}

/// Arena slot: current generation plus the record when occupied.
#[derive(Clone, Debug)]
pub(crate) struct ArenaSlot {
  pub generation: u32,
  pub record: Option<NodeRecord>,
}
