use super::*;
use crate::faces::{Face, FaceOffset};

fn quadtree() -> Octree {
  Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).unwrap()
}

// =========================================================================
// Construction Tests
// =========================================================================

/// A fresh tree is a single root leaf with no neighbors.
#[test]
fn test_new_tree_is_single_leaf() {
  let tree = quadtree();
  let root = tree.root();
  assert_eq!(tree.num_nodes(), 1);
  assert!(tree.is_leaf(root));
  assert_eq!(tree.parent(root), None);
  for face in Face::all(2) {
    assert_eq!(tree.neighbor(root, face), None, "root has no neighbors");
  }
}

/// Invalid branching is a configuration error, not a tree.
#[test]
fn test_new_tree_rejects_branching() {
  let err = Octree::new(TreeConfig::new(3, 2, RefinePolicy::FullNodes)).unwrap_err();
  assert_eq!(err, crate::ForestError::InvalidBranching(3));
}

/// Children link to their siblings across interior faces.
#[test]
fn test_children_link_siblings() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);

  let c00 = tree.child(root, 0).unwrap();
  let c10 = tree.child(root, 1).unwrap();
  let c01 = tree.child(root, 2).unwrap();
  assert_eq!(tree.neighbor(c00, Face::XP), Some(c10));
  assert_eq!(tree.neighbor(c10, Face::XM), Some(c00));
  assert_eq!(tree.neighbor(c00, Face::YP), Some(c01));
  assert_eq!(tree.neighbor(c00, Face::XM), None, "domain edge");
  assert!(tree.neighbor_symmetry_violations().is_empty());
}

/// Grandchildren link to cousins across the parent boundary.
#[test]
fn test_grandchildren_link_cousins() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);
  let left = tree.child(root, 0).unwrap();
  let right = tree.child(root, 1).unwrap();
  tree.create_children(left);
  tree.create_children(right);

  // left child slot (1,0) faces right child slot (0,0)
  let a = tree.child(left, 1).unwrap();
  let b = tree.child(right, 0).unwrap();
  assert_eq!(tree.neighbor(a, Face::XP), Some(b));
  assert_eq!(tree.cousin(left, Face::XP, 0), Some(b));
  assert!(tree.neighbor_symmetry_violations().is_empty());
}

/// make_neighbors accepts a missing side and only updates the live one.
#[test]
fn test_make_neighbors_with_null_side() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);
  let c00 = tree.child(root, 0).unwrap();
  let c10 = tree.child(root, 1).unwrap();

  tree.make_neighbors(Some(c00), None, Face::XP);
  assert_eq!(tree.neighbor(c00, Face::XP), None);
  assert_eq!(tree.neighbor(c10, Face::XM), Some(c00), "other side untouched");

  tree.make_neighbors(Some(c00), Some(c10), Face::XP);
  assert!(tree.neighbor_symmetry_violations().is_empty());
}

/// Diagonal neighbors are reached through face links.
#[test]
fn test_neighbor_at_diagonal() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);
  let c00 = tree.child(root, 0).unwrap();
  let c11 = tree.child(root, 3).unwrap();
  assert_eq!(tree.neighbor_at(c00, FaceOffset::new(1, 1, 0)), Some(c11));
  assert_eq!(tree.neighbor_at(c00, FaceOffset::new(-1, 1, 0)), None);
}

// =========================================================================
// Deletion Tests
// =========================================================================

/// Deleting a subtree clears neighbor back-links and invalidates handles.
#[test]
fn test_delete_subtree_unlinks() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);
  let c00 = tree.child(root, 0).unwrap();
  let c10 = tree.child(root, 1).unwrap();
  tree.create_children(c00);
  let before = tree.num_nodes();

  tree.delete_subtree(c00);

  assert_eq!(tree.num_nodes(), before - 5);
  assert!(!tree.contains(c00), "handle must go stale");
  assert_eq!(tree.child(root, 0), None);
  assert_eq!(tree.neighbor(c10, Face::XM), None);
  assert!(tree.neighbor_symmetry_violations().is_empty());
}

/// Arena slots are reused without reviving stale handles.
#[test]
fn test_slot_reuse_keeps_old_handle_stale() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);
  let old = tree.child(root, 3).unwrap();
  tree.delete_subtree(old);

  let new = tree.create_child(root, 3);
  assert_eq!(new.slot(), old.slot(), "freed slot is reused");
  assert_ne!(new, old);
  assert!(!tree.contains(old));
  assert!(tree.contains(new));
}

/// Removing the last child turns the parent back into a leaf.
#[test]
fn test_delete_children_restores_leaf() {
  let mut tree = quadtree();
  let root = tree.root();
  tree.create_children(root);
  tree.delete_children(root);
  assert!(tree.is_leaf(root));
  assert_eq!(tree.num_nodes(), 1);
}

// =========================================================================
// Level Tests
// =========================================================================

/// Levels advance by log2(k) per refinement step.
#[test]
fn test_level_increment_k8() {
  let mut tree = Octree::new(TreeConfig::new(8, 1, RefinePolicy::FullNodes)).unwrap();
  let root = tree.root();
  let child = tree.create_child(root, 7);
  let grandchild = tree.create_child(child, 0);
  assert_eq!(tree.level(child), 3);
  assert_eq!(tree.level(grandchild), 6);
  assert_eq!(tree.origin(grandchild), [56, 0, 0]);
}

/// Effective level accumulates level_adjust down the path.
#[test]
fn test_effective_level_accumulates_adjust() {
  let mut tree = quadtree();
  let root = tree.root();
  let child = tree.create_child(root, 0);
  tree.node_mut(root).level_adjust = 2;
  tree.node_mut(child).level_adjust = 1;
  assert_eq!(tree.effective_level(child), 1 + 2 + 1);
  assert_eq!(tree.effective_level(root), 2);
}
