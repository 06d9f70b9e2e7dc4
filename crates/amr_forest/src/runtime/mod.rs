//! Actor runtime: a registry of blocks keyed by [`ForestIndex`], each with
//! its own mailbox, drained by jobs on a dedicated rayon pool.
//!
//! # Flow
//!
//! ```text
//! send(to, msg) ──► registry[to] ──► mailbox ──► schedule (once per cell)
//!                                                      │
//!                                    pool job: lock block, drain mailbox,
//!                                    apply effects (spawn, send, retire)
//! ```
//!
//! A global pending-message counter reaches zero only when every mailbox
//! is empty and no handler is running; [`Runtime::wait_idle`] blocks on it.
//! That is the quiescence the adaptation protocol relies on.
//!
//! The pool is separate from rayon's global pool, so a driver that blocks
//! in `wait_idle` from a global-pool job cannot starve the actors.

mod actor;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock, TryLockError};

use rayon::{ThreadPool, ThreadPoolBuilder};

use self::actor::ActorCell;
use crate::block::{Block, BlockContext, Effects, Message, MessageKind};
use crate::error::{ForestError, Result};
use crate::index::ForestIndex;

/// Snapshot of the runtime's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
  /// Delivered messages per [`MessageKind`].
  pub sent: [usize; MessageKind::COUNT],
  /// Messages addressed to blocks that no longer exist.
  pub dropped: usize,
  pub spawned: usize,
  pub retired: usize,
  /// Times a handler found its block already locked.
  pub overlaps: usize,
}

impl CounterSnapshot {
  #[inline]
  pub fn sent(&self, kind: MessageKind) -> usize {
    self.sent[kind.index()]
  }

  /// Counts accumulated since `earlier`.
  pub fn since(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
    CounterSnapshot {
      sent: std::array::from_fn(|i| self.sent[i].saturating_sub(earlier.sent[i])),
      dropped: self.dropped.saturating_sub(earlier.dropped),
      spawned: self.spawned.saturating_sub(earlier.spawned),
      retired: self.retired.saturating_sub(earlier.retired),
      overlaps: self.overlaps.saturating_sub(earlier.overlaps),
    }
  }
}

#[derive(Default)]
struct Counters {
  sent: [AtomicUsize; MessageKind::COUNT],
  dropped: AtomicUsize,
  spawned: AtomicUsize,
  retired: AtomicUsize,
  overlaps: AtomicUsize,
}

impl Counters {
  fn snapshot(&self) -> CounterSnapshot {
    CounterSnapshot {
      sent: std::array::from_fn(|i| self.sent[i].load(Ordering::Relaxed)),
      dropped: self.dropped.load(Ordering::Relaxed),
      spawned: self.spawned.load(Ordering::Relaxed),
      retired: self.retired.load(Ordering::Relaxed),
      overlaps: self.overlaps.load(Ordering::Relaxed),
    }
  }
}

struct Shared {
  pool: ThreadPool,
  context: BlockContext,
  registry: RwLock<HashMap<ForestIndex, Arc<ActorCell>>>,
  pending: Mutex<usize>,
  idle: Condvar,
  counters: Counters,
}

/// Task-plus-channel actor pool.
pub struct Runtime {
  shared: Arc<Shared>,
}

impl Runtime {
  /// Start a pool with `workers` threads (0 = one per core, at least two).
  pub fn new(context: BlockContext, workers: usize) -> Result<Self> {
    let threads = if workers == 0 {
      std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
    } else {
      workers
    };
    let pool = ThreadPoolBuilder::new()
      .num_threads(threads)
      .thread_name(|i| format!("amr-actor-{i}"))
      .build()
      .map_err(|e| ForestError::ThreadPool(e.to_string()))?;

    Ok(Self {
      shared: Arc::new(Shared {
        pool,
        context,
        registry: RwLock::new(HashMap::new()),
        pending: Mutex::new(0),
        idle: Condvar::new(),
        counters: Counters::default(),
      }),
    })
  }

  pub fn context(&self) -> &BlockContext {
    &self.shared.context
  }

  pub fn num_threads(&self) -> usize {
    self.shared.pool.current_num_threads()
  }

  /// Register a block.
  ///
  /// # Panics
  /// Panics if a block with the same index is already registered.
  pub fn spawn(&self, block: Block) {
    self.shared.insert(block);
  }

  /// Queue a message; messages for unknown blocks are dropped with a warning.
  pub fn send(&self, to: ForestIndex, message: Message) {
    self.shared.send(to, message);
  }

  /// Send a copy of `message` to every registered block.
  pub fn broadcast(&self, message: Message) {
    for index in self.indices() {
      self.shared.send(index, message.clone());
    }
  }

  /// Block until no message is queued or being handled.
  pub fn wait_idle(&self) {
    let mut pending = self.shared.pending.lock().unwrap();
    while *pending > 0 {
      pending = self.shared.idle.wait(pending).unwrap();
    }
  }

  pub fn len(&self) -> usize {
    self.shared.registry.read().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn contains(&self, index: &ForestIndex) -> bool {
    self.shared.registry.read().unwrap().contains_key(index)
  }

  /// Registered indices in sorted order.
  pub fn indices(&self) -> Vec<ForestIndex> {
    let mut indices: Vec<ForestIndex> = self.shared.registry.read().unwrap().keys().copied().collect();
    indices.sort_unstable();
    indices
  }

  /// Run `f` on one block. Meant for quiescent periods: a handler running
  /// at the same time would be counted as an overlap.
  pub fn with_block<R>(&self, index: &ForestIndex, f: impl FnOnce(&Block) -> R) -> Option<R> {
    let cell = self.shared.cell(index)?;
    let block = cell.block.lock().unwrap();
    Some(f(&block))
  }

  pub fn with_block_mut<R>(&self, index: &ForestIndex, f: impl FnOnce(&mut Block) -> R) -> Option<R> {
    let cell = self.shared.cell(index)?;
    let mut block = cell.block.lock().unwrap();
    Some(f(&mut block))
  }

  /// Visit every block in index order.
  pub fn for_each_block(&self, mut f: impl FnMut(&Block)) {
    for index in self.indices() {
      self.with_block(&index, &mut f);
    }
  }

  pub fn counters(&self) -> CounterSnapshot {
    self.shared.counters.snapshot()
  }
}

impl Shared {
  fn cell(&self, index: &ForestIndex) -> Option<Arc<ActorCell>> {
    self.registry.read().unwrap().get(index).cloned()
  }

  fn insert(&self, block: Block) {
    let index = *block.index();
    let previous = self
      .registry
      .write()
      .unwrap()
      .insert(index, Arc::new(ActorCell::new(block)));
    assert!(previous.is_none(), "block {index} spawned twice");
    self.counters.spawned.fetch_add(1, Ordering::Relaxed);
  }

  fn remove(&self, index: &ForestIndex) {
    if let Some(cell) = self.registry.write().unwrap().remove(index) {
      cell.retire();
      self.counters.retired.fetch_add(1, Ordering::Relaxed);
    }
  }

  fn send(self: &Arc<Self>, to: ForestIndex, message: Message) {
    let Some(cell) = self.cell(&to) else {
      self.drop_message(&to, &message);
      return;
    };
    self.counters.sent[message.kind().index()].fetch_add(1, Ordering::Relaxed);
    *self.pending.lock().unwrap() += 1;
    cell.post(message);
    self.schedule(cell);
  }

  fn schedule(self: &Arc<Self>, cell: Arc<ActorCell>) {
    if cell.try_schedule() {
      let shared = Arc::clone(self);
      self.pool.spawn(move || shared.drain(&cell));
    }
  }

  /// Handle everything in one cell's mailbox.
  fn drain(self: &Arc<Self>, cell: &ActorCell) {
    loop {
      {
        let mut block = match cell.block.try_lock() {
          Ok(guard) => guard,
          Err(TryLockError::WouldBlock) => {
            self.counters.overlaps.fetch_add(1, Ordering::Relaxed);
            tracing::error!(index = %cell.index, "handler overlap");
            cell.block.lock().unwrap()
          }
          Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        while let Some(message) = cell.next_message() {
          if cell.is_retired() {
            self.drop_message(&cell.index, &message);
          } else {
            let mut effects = Effects::default();
            block.handle(message, &self.context, &mut effects);
            self.apply(effects);
          }
          self.finish_one();
        }
      }

      cell.unschedule();
      // a message may have landed between the last recv and unschedule
      if !cell.has_mail() || !cell.try_schedule() {
        break;
      }
    }
  }

  /// Spawns first so sends can reach new blocks; retires last so a leaving
  /// block's final messages are already queued.
  fn apply(self: &Arc<Self>, effects: Effects) {
    for block in effects.spawned {
      self.insert(block);
    }
    for (to, message) in effects.sends {
      self.send(to, message);
    }
    for index in &effects.retired {
      self.remove(index);
    }
  }

  fn drop_message(&self, to: &ForestIndex, message: &Message) {
    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(to = %to, kind = ?message.kind(), "message for missing block dropped");
  }

  fn finish_one(&self) {
    let mut pending = self.pending.lock().unwrap();
    *pending -= 1;
    if *pending == 0 {
      self.idle.notify_all();
    }
  }
}

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;
