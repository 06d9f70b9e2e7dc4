use super::*;
use crate::config::ForestConfig;
use crate::criterion::ValueThreshold;

/// 4x4 periodic roots, refining where the field exceeds 0.5 and coarsening
/// below 0.25, filled with `value`.
fn runtime_with(value: f64, max_level: i32) -> Runtime {
  let config = ForestConfig {
    rank: 2,
    root_blocks: [4, 4, 1],
    domain_cells: [32, 32, 1],
    ghost_depth: 2,
    max_level,
    workers: 4,
    ..Default::default()
  };
  let criterion = ValueThreshold {
    field: 0,
    refine_above: 0.5,
    coarsen_below: 0.25,
  };
  let layout = config.validate().expect("valid config");
  let context = BlockContext::new(layout, Arc::new(criterion), None);
  let runtime = Runtime::new(context, config.workers).expect("pool");
  for index in runtime.context().layout.root_indices() {
    let mut data = runtime.context().initial_data(&index);
    data.fill_interior(0, |_| value);
    let table = runtime.context().uniform_face_levels(&index);
    runtime.spawn(Block::new(index, data, table));
  }
  runtime
}

fn run_adapt(runtime: &Runtime) {
  runtime.broadcast(Message::BeginAdapt { initial: false });
  runtime.wait_idle();
  runtime.broadcast(Message::CommitAdapt);
  runtime.wait_idle();
}

fn leaf_count(runtime: &Runtime) -> usize {
  let mut leaves = 0;
  runtime.for_each_block(|block| leaves += block.is_leaf() as usize);
  leaves
}

#[test]
fn test_idle_runtime_returns_immediately() {
  let runtime = runtime_with(0.0, 1);
  runtime.wait_idle();
  assert_eq!(runtime.len(), 16);
  assert!(runtime.num_threads() >= 2);
}

/// Messages for blocks that do not exist are counted and dropped.
#[test]
fn test_missing_block_dropped() {
  let runtime = runtime_with(0.0, 1);
  runtime.send(ForestIndex::new(9, 9, 0), Message::BeginRefresh);
  runtime.wait_idle();
  let counters = runtime.counters();
  assert_eq!(counters.dropped, 1);
  assert_eq!(counters.sent(MessageKind::BeginRefresh), 0);
}

/// Every block completes a refresh, and no handler ever overlaps another
/// on the same block.
#[test]
fn test_refresh_storm_quiesces() {
  let runtime = runtime_with(1.0, 1);
  for _ in 0..3 {
    runtime.broadcast(Message::BeginRefresh);
    runtime.wait_idle();
  }

  let counters = runtime.counters();
  assert_eq!(counters.sent(MessageKind::BeginRefresh), 3 * 16);
  assert_eq!(counters.sent(MessageKind::GhostCopy), 3 * 16 * 8);
  assert_eq!(counters.overlaps, 0, "one handler per block at a time");
  runtime.for_each_block(|block| assert_eq!(block.refreshes_completed(), 3));
}

/// Refine everywhere, then coarsen everywhere, through real message passing.
#[test]
fn test_adapt_refine_then_coarsen() {
  let runtime = runtime_with(1.0, 1);
  run_adapt(&runtime);

  assert_eq!(runtime.len(), 16 + 64);
  assert_eq!(leaf_count(&runtime), 64);
  runtime.for_each_block(|block| {
    if block.is_leaf() {
      assert_eq!(block.level(), 1);
      assert!(block.face_levels().iter().all(|l| l.is_none() || *l == Some(1)));
      assert!((block.data().get(0, [3, 3, 0]) - 1.0).abs() < 1e-12);
    }
  });

  // already at max level: nothing changes
  run_adapt(&runtime);
  assert_eq!(runtime.len(), 80);

  for index in runtime.indices() {
    runtime.with_block_mut(&index, |block| {
      block.data_mut().fill_interior(0, |_| 0.0);
    });
  }
  run_adapt(&runtime);

  assert_eq!(runtime.len(), 16);
  assert_eq!(leaf_count(&runtime), 16);
  runtime.for_each_block(|block| {
    assert_eq!(block.level(), 0);
    assert!(block.face_levels().iter().all(|l| l.is_none() || *l == Some(0)));
  });
  let counters = runtime.counters();
  assert_eq!(counters.retired, 64);
  assert_eq!(counters.sent(MessageKind::ChildCoarsened), 64);
  assert_eq!(counters.dropped, 0);
  assert_eq!(counters.overlaps, 0);
}

#[test]
fn test_counter_snapshot_since() {
  let runtime = runtime_with(0.0, 1);
  let before = runtime.counters();
  runtime.broadcast(Message::BeginRefresh);
  runtime.wait_idle();
  let delta = runtime.counters().since(&before);
  assert_eq!(delta.sent(MessageKind::BeginRefresh), 16);
  assert_eq!(delta.spawned, 0);
}
