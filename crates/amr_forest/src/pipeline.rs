//! Async Cycle Pipeline
//!
//! Runs one adapt-then-refresh cycle of a [`Forest`] off the calling thread.
//! The forest moves into the task and comes back with the result, so the
//! caller cannot touch blocks while actors are running.
//!
//! # Flow
//!
//! ```text
//! Caller                            Async (rayon)
//! ┌────────────────┐
//! │ start(forest)  │──────────────► ┌───────────────┐
//! └────────────────┘                │ adapt()       │
//!                                   │ refresh()     │
//!                                   │ advance(dt)   │
//!                                   └───────┬───────┘
//! ┌────────────────┐                        │
//! │ poll_results() │◄───────────────────────┘
//! │ - take forest  │
//! └────────────────┘
//! ```
//!
//! The actor runtime has its own thread pool, so blocking on quiescence
//! inside a rayon global-pool task cannot starve the actors.

use crossbeam_channel::{self as channel, Receiver, TryRecvError};

use crate::forest::Forest;
use crate::stats::{AdaptStats, RefreshStats};

/// A finished cycle; hands the forest back.
pub struct CycleResult {
  pub forest: Forest,
  pub adapt: AdaptStats,
  pub refresh: RefreshStats,
}

/// Non-blocking adapt + refresh pipeline.
#[derive(Default)]
pub struct AsyncCycle {
  receiver: Option<Receiver<CycleResult>>,
}

impl AsyncCycle {
  pub fn new() -> Self {
    Self { receiver: None }
  }

  /// Check if a cycle is running.
  pub fn is_busy(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start one cycle advancing time by `dt`.
  ///
  /// Returns the forest untouched if a cycle is already running.
  pub fn start(&mut self, forest: Forest, dt: f64) -> Result<(), Box<Forest>> {
    if self.is_busy() {
      return Err(Box::new(forest));
    }

    let (sender, receiver) = channel::bounded(1);
    self.receiver = Some(receiver);

    rayon::spawn(move || {
      let result = run_cycle(forest, dt);
      // receiver dropped = cancelled
      let _ = sender.send(result);
    });

    Ok(())
  }

  /// Poll for the result (non-blocking).
  pub fn poll_results(&mut self) -> Option<CycleResult> {
    let receiver = self.receiver.as_ref()?;

    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        Some(result)
      }
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => {
        self.receiver = None;
        None
      }
    }
  }

  /// Block until the running cycle finishes.
  pub fn wait(&mut self) -> Option<CycleResult> {
    let receiver = self.receiver.take()?;
    receiver.recv().ok()
  }

  /// Forget the running cycle. Its forest is dropped when the task ends.
  pub fn cancel(&mut self) {
    self.receiver = None;
  }
}

#[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "pipeline::cycle"))]
fn run_cycle(mut forest: Forest, dt: f64) -> CycleResult {
  let adapt = forest.adapt();
  let refresh = forest.refresh();
  forest.advance(dt);
  CycleResult { forest, adapt, refresh }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::config::ForestConfig;
  use crate::criterion::ValueThreshold;

  fn forest() -> Forest {
    let config = ForestConfig {
      workers: 2,
      ..Default::default()
    };
    let criterion = ValueThreshold {
      field: 0,
      refine_above: 0.5,
      coarsen_below: 0.25,
    };
    Forest::new(&config, Arc::new(criterion), None).expect("forest")
  }

  #[test]
  fn test_cycle_returns_forest() {
    let mut pipeline = AsyncCycle::new();
    assert!(pipeline.poll_results().is_none());
    assert!(pipeline.start(forest(), 0.5).is_ok());
    assert!(pipeline.is_busy());

    let result = pipeline.wait().expect("cycle result");
    assert!(!pipeline.is_busy());
    assert_eq!(result.forest.cycle(), 1);
    assert_eq!(result.adapt.refined, 0);
    assert_eq!(result.refresh.completed, 4);
  }

  #[test]
  fn test_start_while_busy_returns_forest() {
    let mut pipeline = AsyncCycle::new();
    assert!(pipeline.start(forest(), 0.5).is_ok());
    let rejected = pipeline.start(forest(), 0.5);
    assert!(rejected.is_err());
    pipeline.wait();
  }
}
