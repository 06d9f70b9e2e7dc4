//! Forest benchmarks.
//!
//! - **index**: neighbor stepping across tree and array boundaries
//! - **tree**: refine + balance + optimize on a random level field
//! - **forest**: one adapt round and one refresh on a refined 2-D forest

use std::sync::Arc;

use amr_forest::{
  ChildOffset, FaceOffset, Forest, ForestConfig, ForestIndex, InitialCondition, LevelField, Octree, RefinePolicy,
  TreeConfig, ValueThreshold,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Index
// =============================================================================

fn bench_index_neighbors(c: &mut Criterion) {
  let mut index = ForestIndex::new(3, 5, 0);
  for level in 0..8 {
    index = index.index_child(ChildOffset::new((level % 2) as u8, 1, 0));
  }
  let faces = [
    FaceOffset::new(1, 0, 0),
    FaceOffset::new(-1, 0, 0),
    FaceOffset::new(0, 1, 0),
    FaceOffset::new(1, 1, 0),
  ];

  c.bench_function("index/neighbor_level8", |b| {
    b.iter(|| {
      for face in faces {
        black_box(black_box(index).index_neighbor(face, [8, 8, 1]));
      }
    })
  });
}

// =============================================================================
// Tree
// =============================================================================

fn random_field(dims: [usize; 3], max_level: i32, seed: u64) -> LevelField {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut field = LevelField::new(dims);
  for _ in 0..16 {
    let cell = [0, 1, 2].map(|a| rng.random_range(0..dims[a]));
    field.set(cell, rng.random_range(1..=max_level));
  }
  field
}

fn bench_tree(c: &mut Criterion) {
  let mut group = c.benchmark_group("tree");
  for (name, rank, dims) in [("2d", 2, [64, 64, 1]), ("3d", 3, [32, 32, 32])] {
    let field = random_field(dims, 5, 7);
    for policy in [RefinePolicy::FullNodes, RefinePolicy::PerChild] {
      let id = BenchmarkId::new(name, format!("{policy:?}"));
      group.bench_with_input(id, &field, |b, field| {
        b.iter(|| {
          let mut tree = Octree::new(TreeConfig::new(2, rank, policy)).expect("tree");
          tree.refine(field, 5);
          tree.balance();
          tree.optimize();
          black_box(tree.num_nodes())
        })
      });
    }
  }
  group.finish();
}

// =============================================================================
// Forest
// =============================================================================

fn refined_forest() -> Forest {
  let config = ForestConfig {
    rank: 2,
    root_blocks: [8, 8, 1],
    domain_cells: [128, 128, 1],
    ghost_depth: 2,
    max_level: 3,
    ..Default::default()
  };
  let criterion = ValueThreshold {
    field: 0,
    refine_above: 0.5,
    coarsen_below: 0.1,
  };
  let center = DVec3::new(0.5, 0.5, 0.0);
  let initial: Arc<dyn InitialCondition> =
    Arc::new(move |_field: usize, p: DVec3| if (p.distance(center) - 0.3).abs() < 0.02 { 1.0 } else { 0.0 });
  let mut forest = Forest::new(&config, Arc::new(criterion), Some(initial)).expect("forest");
  forest.build_initial_mesh();
  forest
}

fn bench_forest(c: &mut Criterion) {
  let mut forest = refined_forest();
  let mut group = c.benchmark_group("forest");
  group.sample_size(20);

  // the data does not change between iterations, so adapt keeps the mesh
  group.bench_function("adapt_steady", |b| b.iter(|| black_box(forest.adapt())));
  group.bench_function("refresh", |b| b.iter(|| black_box(forest.refresh())));
  group.finish();
}

criterion_group!(structure, bench_index_neighbors, bench_tree);
criterion_group!(protocol, bench_forest);
criterion_main!(structure, protocol);
