//! Octree - arena-backed k^d-ary tree with symmetric neighbor links.
//!
//! # Ownership
//!
//! ```text
//!            parent ──owns──► children[k^d]
//!            child  ──weak──► parent
//!   node ◄──weak, symmetric──► neighbor[face]   (same level only)
//! ```
//!
//! All links are [`NodeId`] handles into one arena. Deleting a node first
//! clears every live neighbor's back-link and the parent's slot, then frees
//! the arena slot so the old handle stops resolving.

use crate::error::Result;
use crate::faces::{Face, FaceOffset};

use super::config::{RefinePolicy, TreeConfig, TreeShape};
use super::node::{ArenaSlot, NodeId, NodeRecord};
use super::stats::TreeStats;

/// A single k^d-ary tree.
#[derive(Clone, Debug)]
pub struct Octree {
  shape: TreeShape,
  policy: RefinePolicy,
  slots: Vec<ArenaSlot>,
  free: Vec<u32>,
  root: NodeId,
  len: usize,
}

impl Octree {
  /// Create a tree holding a single root leaf.
  pub fn new(config: TreeConfig) -> Result<Self> {
    let shape = config.validate()?;
    let mut tree = Self {
      shape,
      policy: config.policy,
      slots: Vec::new(),
      free: Vec::new(),
      root: NodeId::new(0, 0),
      len: 0,
    };
    tree.root = tree.alloc(NodeRecord::root());
    Ok(tree)
  }

  #[inline]
  pub fn shape(&self) -> TreeShape {
    self.shape
  }

  #[inline]
  pub fn policy(&self) -> RefinePolicy {
    self.policy
  }

  #[inline]
  pub fn root(&self) -> NodeId {
    self.root
  }

  /// Number of live nodes, interior nodes included.
  #[inline]
  pub fn num_nodes(&self) -> usize {
    self.len
  }

  /// Whether the handle still names a live node.
  #[inline]
  pub fn contains(&self, id: NodeId) -> bool {
    self.get(id).is_some()
  }

  // ---------------------------------------------------------------------
  // Arena
  // ---------------------------------------------------------------------

  fn alloc(&mut self, record: NodeRecord) -> NodeId {
    self.len += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.record = Some(record);
      return NodeId::new(index, slot.generation);
    }
    let index = self.slots.len() as u32;
    self.slots.push(ArenaSlot {
      generation: 0,
      record: Some(record),
    });
    NodeId::new(index, 0)
  }

  fn release(&mut self, id: NodeId) {
    let slot = &mut self.slots[id.slot()];
    slot.record = None;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    self.len -= 1;
  }

  pub(crate) fn get(&self, id: NodeId) -> Option<&NodeRecord> {
    self
      .slots
      .get(id.slot())
      .filter(|slot| slot.generation == id.generation)
      .and_then(|slot| slot.record.as_ref())
  }

  /// Resolve a handle that must be live.
  ///
  /// # Panics
  /// Panics on a stale handle: the caller kept a reference past deletion.
  pub(crate) fn node(&self, id: NodeId) -> &NodeRecord {
    match self.get(id) {
      Some(record) => record,
      None => panic!("stale node handle {id:?}"),
    }
  }

  pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeRecord {
    match self
      .slots
      .get_mut(id.slot())
      .filter(|slot| slot.generation == id.generation)
      .and_then(|slot| slot.record.as_mut())
    {
      Some(record) => record,
      None => panic!("stale node handle {id:?}"),
    }
  }

  // ---------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------

  #[inline]
  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).parent
  }

  /// Child in `slot`, if it exists.
  #[inline]
  pub fn child(&self, id: NodeId, slot: usize) -> Option<NodeId> {
    self
      .node(id)
      .children
      .as_ref()
      .and_then(|children| children[slot])
  }

  /// Existing children with their slot numbers.
  pub fn children(&self, id: NodeId) -> impl Iterator<Item = (usize, NodeId)> + '_ {
    self
      .node(id)
      .children
      .iter()
      .flat_map(|slots| slots.iter().enumerate())
      .filter_map(|(slot, child)| child.map(|child| (slot, child)))
  }

  #[inline]
  pub fn is_leaf(&self, id: NodeId) -> bool {
    self.node(id).is_leaf()
  }

  #[inline]
  pub fn has_children(&self, id: NodeId) -> bool {
    !self.is_leaf(id)
  }

  /// Same-level neighbor across `face`.
  #[inline]
  pub fn neighbor(&self, id: NodeId, face: Face) -> Option<NodeId> {
    self.node(id).neighbors[face.index()]
  }

  /// Refinement level: depth times the level increment.
  #[inline]
  pub fn level(&self, id: NodeId) -> i32 {
    self.node(id).level
  }

  #[inline]
  pub fn level_adjust(&self, id: NodeId) -> i32 {
    self.node(id).level_adjust
  }

  /// Level including every `level_adjust` on the path from the root.
  pub fn effective_level(&self, id: NodeId) -> i32 {
    let mut adjust = 0;
    let mut cursor = Some(id);
    while let Some(node) = cursor {
      adjust += self.level_adjust(node);
      cursor = self.parent(node);
    }
    self.level(id) + adjust
  }

  /// Integer position among nodes of the same depth.
  #[inline]
  pub fn origin(&self, id: NodeId) -> [u32; 3] {
    self.node(id).origin
  }

  /// All live nodes in depth-first order.
  pub fn nodes(&self) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(self.len);
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      out.push(id);
      stack.extend(self.children(id).map(|(_, child)| child));
    }
    out
  }

  /// All leaves in depth-first order.
  pub fn leaves(&self) -> Vec<NodeId> {
    self.nodes().into_iter().filter(|&id| self.is_leaf(id)).collect()
  }

  pub fn stats(&self) -> TreeStats {
    TreeStats::collect(self)
  }

  // ---------------------------------------------------------------------
  // Neighbor links
  // ---------------------------------------------------------------------

  /// Link `a` and `b` across `face` of `a`; a `None` side is a domain edge.
  pub fn make_neighbors(&mut self, a: Option<NodeId>, b: Option<NodeId>, face: Face) {
    if let Some(a) = a {
      self.node_mut(a).neighbors[face.index()] = b;
    }
    if let Some(b) = b {
      self.node_mut(b).neighbors[face.opposite().index()] = a;
    }
  }

  /// Child `slot` of the neighbor across `face`, if both exist.
  #[inline]
  pub fn cousin(&self, id: NodeId, face: Face, slot: usize) -> Option<NodeId> {
    self
      .neighbor(id, face)
      .and_then(|neighbor| self.child(neighbor, slot))
  }

  /// Same-level node reached by stepping across every axis of `offset`.
  ///
  /// Edge and corner neighbors are reached by chaining face links; every
  /// axis order is tried since an intermediate node may be missing.
  pub fn neighbor_at(&self, id: NodeId, offset: FaceOffset) -> Option<NodeId> {
    let faces: Vec<Face> = (0..self.shape.rank())
      .filter(|&axis| offset.get(axis) != 0)
      .map(|axis| Face::new(axis, offset.get(axis) > 0))
      .collect();
    let walk = |order: &[Face]| {
      order
        .iter()
        .try_fold(id, |node, &face| self.neighbor(node, face))
    };
    match faces.len() {
      0 => Some(id),
      1 => walk(&faces),
      2 => walk(&faces).or_else(|| walk(&[faces[1], faces[0]])),
      _ => PERMUTATIONS_3
        .iter()
        .find_map(|p| walk(&[faces[p[0]], faces[p[1]], faces[p[2]]])),
    }
  }

  // ---------------------------------------------------------------------
  // Structure mutation
  // ---------------------------------------------------------------------

  /// Create the child in `slot` and link it to its same-level neighbors.
  ///
  /// Returns the existing child when the slot is already filled.
  pub fn create_child(&mut self, parent: NodeId, slot: usize) -> NodeId {
    if let Some(existing) = self.child(parent, slot) {
      return existing;
    }
    let shape = self.shape;
    let coords = shape.child_coords(slot);
    let (level, origin) = {
      let record = self.node(parent);
      let k = shape.branching() as u32;
      let origin = [0, 1, 2].map(|axis| record.origin[axis] * k + coords[axis] as u32);
      (record.level + shape.increment(), origin)
    };

    let mut record = NodeRecord::root();
    record.parent = Some(parent);
    record.level = level;
    record.origin = origin;
    let child = self.alloc(record);

    let num_children = shape.num_children();
    let slots = self
      .node_mut(parent)
      .children
      .get_or_insert_with(|| vec![None; num_children].into_boxed_slice());
    slots[slot] = Some(child);

    self.link_child(parent, child, coords);
    child
  }

  /// Create every missing child slot.
  pub fn create_children(&mut self, parent: NodeId) {
    for slot in 0..self.shape.num_children() {
      self.create_child(parent, slot);
    }
  }

  /// Connect a new child to siblings inside the parent and cousins outside.
  fn link_child(&mut self, parent: NodeId, child: NodeId, coords: [usize; 3]) {
    let k = self.shape.branching();
    for face in Face::all(self.shape.rank()) {
      let axis = face.axis();
      let mut across = coords;
      let inside = if face.is_upper() {
        coords[axis] + 1 < k
      } else {
        coords[axis] > 0
      };
      let neighbor = if inside {
        across[axis] = if face.is_upper() { coords[axis] + 1 } else { coords[axis] - 1 };
        self.child(parent, self.shape.child_slot(across))
      } else {
        across[axis] = if face.is_upper() { 0 } else { k - 1 };
        self.cousin(parent, face, self.shape.child_slot(across))
      };
      self.make_neighbors(Some(child), neighbor, face);
    }
  }

  /// Delete `id` and its whole subtree, unlinking neighbors and parent.
  ///
  /// # Panics
  /// Panics when asked to delete the root.
  pub fn delete_subtree(&mut self, id: NodeId) {
    assert_ne!(id, self.root, "the root is owned by the tree");
    let children: Vec<NodeId> = self.children(id).map(|(_, child)| child).collect();
    for child in children {
      self.delete_subtree(child);
    }

    let record = self.node(id).clone();
    for (face_index, neighbor) in record.neighbors.iter().enumerate() {
      if let Some(neighbor) = *neighbor {
        let back = Face::from_index(face_index).opposite().index();
        let links = &mut self.node_mut(neighbor).neighbors[back];
        if *links == Some(id) {
          *links = None;
        }
      }
    }
    if let Some(parent) = record.parent {
      let parent_record = self.node_mut(parent);
      if let Some(slots) = parent_record.children.as_mut() {
        for slot in slots.iter_mut().filter(|slot| **slot == Some(id)) {
          *slot = None;
        }
      }
      if parent_record.is_leaf() {
        parent_record.children = None;
      }
    }
    self.release(id);
  }

  /// Delete every child subtree of `id`, leaving it a leaf.
  pub fn delete_children(&mut self, id: NodeId) {
    let children: Vec<NodeId> = self.children(id).map(|(_, child)| child).collect();
    for child in children {
      self.delete_subtree(child);
    }
  }

  // ---------------------------------------------------------------------
  // Invariant checks
  // ---------------------------------------------------------------------

  /// Links `(node, face)` whose target does not link back.
  pub fn neighbor_symmetry_violations(&self) -> Vec<(NodeId, Face)> {
    let mut violations = Vec::new();
    for id in self.nodes() {
      for face in Face::all(self.shape.rank()) {
        if let Some(neighbor) = self.neighbor(id, face) {
          let linked_back = self
            .get(neighbor)
            .is_some_and(|record| record.neighbors[face.opposite().index()] == Some(id));
          if !linked_back {
            violations.push((id, face));
          }
        }
      }
    }
    violations
  }

  /// Pairs of face-adjacent leaves whose levels differ by more than one
  /// refinement step.
  pub fn balance_violations(&self) -> Vec<(NodeId, NodeId)> {
    let leaves = self.leaves();
    let deepest = leaves.iter().map(|&id| self.level(id)).max().unwrap_or(0);
    let boxes: Vec<_> = leaves
      .iter()
      .map(|&id| self.fine_box(id, deepest))
      .collect();
    let step = self.shape.increment();

    let mut violations = Vec::new();
    for (i, a) in leaves.iter().enumerate() {
      for (j, b) in leaves.iter().enumerate().skip(i + 1) {
        let gap = (self.level(*a) - self.level(*b)).abs();
        if gap > step && face_adjacent(&boxes[i], &boxes[j], self.shape.rank()) {
          violations.push((*a, *b));
        }
      }
    }
    violations
  }

  /// Half-open box of `id` in units of nodes at level `finest`.
  fn fine_box(&self, id: NodeId, finest: i32) -> ([u64; 3], [u64; 3]) {
    let record = self.node(id);
    let scale = 1u64 << (finest - record.level);
    let low = record.origin.map(|o| o as u64 * scale);
    let up = [0, 1, 2].map(|axis| low[axis] + scale);
    (low, up)
  }
}

/// Axis orders for 3-D corner walks.
const PERMUTATIONS_3: [[usize; 3]; 6] = [
  [0, 1, 2],
  [0, 2, 1],
  [1, 0, 2],
  [1, 2, 0],
  [2, 0, 1],
  [2, 1, 0],
];

/// Whether two half-open boxes share a face of positive area.
fn face_adjacent(a: &([u64; 3], [u64; 3]), b: &([u64; 3], [u64; 3]), rank: usize) -> bool {
  let mut touching = 0;
  for axis in 0..rank {
    let (a_low, a_up) = (a.0[axis], a.1[axis]);
    let (b_low, b_up) = (b.0[axis], b.1[axis]);
    if a_up == b_low || b_up == a_low {
      touching += 1;
    } else if a_up <= b_low || b_up <= a_low {
      return false;
    }
  }
  touching == 1
}
