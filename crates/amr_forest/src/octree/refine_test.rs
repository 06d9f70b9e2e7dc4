use super::*;
use crate::octree::TreeConfig;

fn single_point_field() -> LevelField {
  let mut field = LevelField::new([8, 8, 1]);
  field.set([5, 2, 0], 3);
  field
}

/// Cell range covered by a node in a field of `dims`, for a k = 2 tree.
fn covers(tree: &Octree, id: NodeId, cell: [usize; 2], dims: usize) -> bool {
  let level = tree.level(id) as u32;
  let size = dims >> level;
  let origin = tree.origin(id);
  (0..2).all(|axis| {
    let low = origin[axis] as usize * size;
    (low..low + size).contains(&cell[axis])
  })
}

// =========================================================================
// Full-Node Refinement Tests
// =========================================================================

/// One marked level-3 cell yields a chain of fully refined ancestors.
#[test]
fn test_refine_single_point_full_nodes() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).unwrap();
  let depth = tree.refine(&single_point_field(), 3);

  assert_eq!(depth, 3);
  let stats = tree.stats();
  assert_eq!(stats.nodes_per_level, vec![1, 4, 4, 4]);

  let deepest: Vec<_> = tree
    .nodes()
    .into_iter()
    .filter(|&id| tree.level(id) == 3 && covers(&tree, id, [5, 2], 8))
    .collect();
  assert_eq!(deepest.len(), 1, "exactly one level-3 node covers the point");

  let mut ancestor = tree.parent(deepest[0]);
  let mut expected_level = 2;
  while let Some(id) = ancestor {
    assert_eq!(tree.level(id), expected_level);
    assert_eq!(tree.children(id).count(), 4, "ancestor at {expected_level} is full");
    expected_level -= 1;
    ancestor = tree.parent(id);
  }
  assert_eq!(expected_level, -1, "ancestors at levels 2, 1, 0");
}

/// max_level caps refinement even when the field asks for more.
#[test]
fn test_refine_respects_max_level() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).unwrap();
  let depth = tree.refine(&single_point_field(), 2);
  assert_eq!(depth, 2);
  assert_eq!(tree.stats().max_level, 2);
}

/// A field asking for nothing leaves the root alone.
#[test]
fn test_refine_flat_field_noop() {
  let mut tree = Octree::new(TreeConfig::new(2, 3, RefinePolicy::FullNodes)).unwrap();
  let depth = tree.refine(&LevelField::from_fn([8, 8, 8], |_| -1), 5);
  assert_eq!(depth, 0);
  assert_eq!(tree.num_nodes(), 1);
}

/// Level 0 everywhere asks the root, and only the root, to refine.
#[test]
fn test_refine_zero_field_splits_root_once() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).unwrap();
  let depth = tree.refine(&LevelField::new([8, 8, 1]), 5);
  assert_eq!(depth, 1);
  assert_eq!(tree.num_nodes(), 5);
  assert_eq!(tree.stats().nodes_per_level, vec![1, 4]);

  let mut tree = Octree::new(TreeConfig::new(2, 3, RefinePolicy::PerChild)).unwrap();
  assert_eq!(tree.refine(&LevelField::new([8, 8, 8]), 5), 1);
  assert_eq!(tree.num_nodes(), 9);
}

/// A cell holding `v` refines the nodes covering it through level `v`.
#[test]
fn test_refine_includes_requested_level() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).unwrap();
  let field = LevelField::from_fn([8, 8, 1], |_| 1);
  assert_eq!(tree.refine(&field, 5), 2);
  assert_eq!(tree.stats().nodes_per_level, vec![1, 4, 16]);
}

/// Bounds stop refinement once a node covers fewer than k cells per axis.
#[test]
fn test_refine_stops_at_cell_resolution() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).unwrap();
  let field = LevelField::from_fn([4, 4, 1], |_| 10);
  let depth = tree.refine(&field, 10);
  assert_eq!(depth, 2, "4 cells per axis allow two binary splits");
  assert_eq!(tree.stats().leaves, 16);
}

// =========================================================================
// Per-Child Refinement Tests
// =========================================================================

/// Per-child refinement creates only the children on the path once the
/// zero background stops asking.
#[test]
fn test_refine_single_point_per_child() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::PerChild)).unwrap();
  let depth = tree.refine(&single_point_field(), 3);

  assert_eq!(depth, 3);
  // every root child holds level 0 >= 0, below that only the marked path
  assert_eq!(tree.stats().nodes_per_level, vec![1, 4, 1, 1]);
  let deepest: Vec<_> = tree.leaves().into_iter().filter(|&id| tree.level(id) == 3).collect();
  assert_eq!(deepest.len(), 1);
  assert!(covers(&tree, deepest[0], [5, 2], 8));
}

/// Higher branching factors split k ways and step log2(k) levels.
#[test]
fn test_refine_k4_per_child() {
  let mut tree = Octree::new(TreeConfig::new(4, 2, RefinePolicy::PerChild)).unwrap();
  let mut field = LevelField::new([16, 16, 1]);
  field.set([15, 0, 0], 4);
  let depth = tree.refine(&field, 4);

  assert_eq!(depth, 4);
  assert_eq!(tree.stats().nodes_per_level, vec![1, 0, 16, 0, 1]);
  let deepest: Vec<_> = tree.leaves().into_iter().filter(|&id| tree.level(id) == 4).collect();
  assert_eq!(deepest.len(), 1);
  assert_eq!(tree.origin(deepest[0]), [15, 0, 0]);
}

/// NodeBounds split uses half-open ranges at low + i * span / k.
#[test]
fn test_bounds_split_half_open() {
  let bounds = NodeBounds::new([0, 0, 0], [6, 5, 1]);
  let left = bounds.split(4, 2, [0, 0, 0]);
  let last = bounds.split(4, 2, [3, 3, 0]);
  assert_eq!(left, NodeBounds::new([0, 0, 0], [1, 1, 1]));
  assert_eq!(last, NodeBounds::new([4, 3, 0], [6, 5, 1]));
  assert!(bounds.is_subdivisible(4, 2));
  assert!(!left.is_subdivisible(2, 2));
}
