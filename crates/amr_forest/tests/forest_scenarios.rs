//! End-to-end scenarios through the public API: the tree engine on a single
//! marked cell, and whole forests in one, two and three dimensions.

use std::collections::HashMap;
use std::sync::Arc;

use amr_forest::{
  Adapt, BlockView, BoundaryKind, CellBox, FaceLevels, FaceOffset, FaceOffsets, Forest, ForestConfig, ForestIndex,
  InitialCondition, LevelField, Octree, RefineCriterion, RefinePolicy, TreeConfig, ValueThreshold,
};
use glam::DVec3;

/// Refines whichever block contains `point`.
struct RefineAt {
  point: DVec3,
}

impl RefineCriterion for RefineAt {
  fn evaluate(&self, block: &BlockView<'_>) -> Adapt {
    if block.bounds.contains_point(self.point) {
      Adapt::Refine
    } else {
      Adapt::Same
    }
  }
}

fn assert_consistent(forest: &Forest) {
  let violations = forest.balance_violations();
  assert!(violations.is_empty(), "2:1 violations: {violations:?}");
  let mismatches = forest.face_level_mismatches();
  assert!(mismatches.is_empty(), "stale face tables: {mismatches:?}");
}

/// Check every ghost cell facing another leaf against `exact`.
fn assert_ghosts_exact(forest: &Forest, exact: impl Fn(DVec3) -> f64) {
  let layout = forest.layout().clone();
  let ghosts = FaceOffsets::new(layout.rank, 0);
  let tables: HashMap<ForestIndex, FaceLevels> = forest
    .leaves()
    .iter()
    .map(|leaf| (leaf.index, forest.face_levels(&leaf.index).expect("leaf exists")))
    .collect();

  let mut checked = 0;
  forest.for_each_leaf(|leaf, data| {
    let table = &tables[&leaf.index];
    for face in ghosts.iter() {
      if table[face.slot()].is_none() {
        continue;
      }
      for cell in CellBox::ghost(layout.block_size, layout.ghost, face).cells() {
        let expected = exact(layout.cell_center(&leaf.index, cell));
        let actual = data.get(0, cell);
        assert!(
          (actual - expected).abs() < 1e-9,
          "leaf {} ghost {cell:?} toward {face}: {actual} != {expected}",
          leaf.index
        );
        checked += 1;
      }
    }
  });
  assert!(checked > 0);
}

// =========================================================================
// Tree Engine
// =========================================================================

/// A single max-level cell refines one chain of full nodes.
#[test]
fn test_tree_single_marked_cell() {
  let mut tree = Octree::new(TreeConfig::new(2, 2, RefinePolicy::FullNodes)).expect("tree");
  let mut field = LevelField::new([8, 8, 1]);
  field.set([5, 2, 0], 3);

  assert_eq!(tree.refine(&field, 3), 3);
  let stats = tree.stats();
  assert_eq!(stats.nodes_per_level, vec![1, 4, 4, 4]);

  tree.balance();
  let nodes = tree.num_nodes();
  tree.balance();
  assert_eq!(tree.num_nodes(), nodes, "balance is a fixed point");
  assert!(tree.balance_violations().is_empty());
  assert!(tree.neighbor_symmetry_violations().is_empty());
}

#[test]
fn test_single_root_boundary() {
  let root = ForestIndex::new(0, 0, 0);
  assert!(root.is_on_boundary(FaceOffset::new(-1, 0, 0), [1, 1, 1], [false; 3]));
  assert!(!root.is_on_boundary(FaceOffset::new(-1, 0, 0), [1, 1, 1], [true; 3]));
}

// =========================================================================
// Forests
// =========================================================================

/// A 3-D forest refined toward one point stays balanced across faces, edges
/// and corners, and a linear field survives the ghost exchange exactly.
#[test]
fn test_forest_3d_linear_refresh() {
  let config = ForestConfig {
    rank: 3,
    root_blocks: [2, 2, 2],
    domain_cells: [16, 16, 16],
    ghost_depth: 2,
    max_level: 2,
    boundary: BoundaryKind::Outflow,
    workers: 4,
    ..Default::default()
  };
  let exact = |p: DVec3| 0.5 + p.x - 2.0 * p.y + 3.0 * p.z;
  let initial: Arc<dyn InitialCondition> = Arc::new(move |_field: usize, p: DVec3| exact(p));
  let point = DVec3::new(0.45, 0.55, 0.45);

  let mut forest = Forest::new(&config, Arc::new(RefineAt { point }), Some(initial)).expect("forest");
  forest.build_initial_mesh();
  assert_consistent(&forest);
  assert!(forest.leaves().iter().any(|leaf| leaf.level == 2));

  let stats = forest.refresh();
  assert_eq!(stats.completed, forest.num_leaves());
  assert!(stats.copies > 0 && stats.restricts > 0 && stats.prolongs > 0);
  assert_eq!(forest.counters().overlaps, 0);
  assert_ghosts_exact(&forest, exact);
}

/// A pulse travelling around a periodic 1-D domain: refinement follows it
/// and the mesh never loses balance.
#[test]
fn test_forest_1d_travelling_pulse() {
  let config = ForestConfig {
    rank: 1,
    root_blocks: [8, 1, 1],
    domain_cells: [64, 1, 1],
    ghost_depth: 2,
    max_level: 3,
    boundary: BoundaryKind::Periodic,
    workers: 2,
    ..Default::default()
  };
  let pulse = |x: f64, t: f64| {
    let center = (0.2 + t).rem_euclid(1.0);
    let d = (x - center).abs().min(1.0 - (x - center).abs());
    if d < 0.05 {
      1.0
    } else {
      0.0
    }
  };
  let initial: Arc<dyn InitialCondition> = Arc::new(move |_field: usize, p: DVec3| pulse(p.x, 0.0));
  let criterion = ValueThreshold {
    field: 0,
    refine_above: 0.5,
    coarsen_below: 0.25,
  };

  let mut forest = Forest::new(&config, Arc::new(criterion), Some(initial)).expect("forest");
  forest.build_initial_mesh();
  assert_consistent(&forest);

  let layout = forest.layout().clone();
  for _ in 0..8 {
    let time = forest.time();
    forest.update_leaves(|leaf, data| {
      data.fill_interior(0, |cell| pulse(layout.cell_center(&leaf.index, cell).x, time));
    });
    let adapt = forest.adapt();
    assert_eq!(adapt.dropped, 0);
    let refresh = forest.refresh();
    assert_eq!(refresh.completed, refresh.leaves);
    assert_consistent(&forest);
    forest.advance(0.05);
  }

  let counters = forest.counters();
  assert!(counters.retired > 0, "the pulse left refined regions behind");
  assert_eq!(counters.overlaps, 0);
}
