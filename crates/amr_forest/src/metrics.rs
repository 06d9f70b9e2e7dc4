//! Round metrics for the forest driver.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use amr_forest::metrics::{ForestMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! metrics.record_adapt(&adapt_stats);
//! metrics.record_refresh(&refresh_stats);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::stats::{AdaptStats, RefreshStats};

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Rolling window for storing recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }
}

impl RollingWindow<u64> {
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = self.buffer.iter().min()?;
    let max = self.buffer.iter().max()?;
    Some((*min, *max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(64)
  }
}

/// Rolling history of adaptation and refresh rounds.
#[derive(Debug, Clone, Default)]
pub struct ForestMetrics {
  /// Adapt round times in microseconds.
  pub adapt_timings: RollingWindow<u64>,
  /// Refresh times in microseconds.
  pub refresh_timings: RollingWindow<u64>,
  /// Level notices per adapt round.
  pub notices: RollingWindow<u64>,
  /// Ghost buffers per refresh.
  pub buffers: RollingWindow<u64>,
  pub last_adapt: Option<AdaptStats>,
  pub last_refresh: Option<RefreshStats>,
  /// Refinements over the whole run.
  pub total_refined: u64,
  /// Coarsenings over the whole run.
  pub total_coarsened: u64,
}

impl ForestMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_adapt(&mut self, stats: &AdaptStats) {
    if !is_enabled() {
      return;
    }
    self.adapt_timings.push(stats.elapsed_us);
    self.notices.push(stats.notices as u64);
    self.total_refined += stats.refined as u64;
    self.total_coarsened += stats.coarsened as u64;
    self.last_adapt = Some(*stats);
  }

  pub fn record_refresh(&mut self, stats: &RefreshStats) {
    if !is_enabled() {
      return;
    }
    self.refresh_timings.push(stats.elapsed_us);
    self.buffers.push(stats.buffers() as u64);
    self.last_refresh = Some(*stats);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window_evicts_oldest() {
    let mut window = RollingWindow::new(3);
    for value in [5u64, 1, 9, 4] {
      window.push(value);
    }
    assert_eq!(window.min_max(), Some((1, 9)));
    assert!((window.average() - 14.0 / 3.0).abs() < 1e-12);
  }

  #[test]
  fn test_empty_window() {
    let window = RollingWindow::<u64>::default();
    assert_eq!(window.min_max(), None);
    assert_eq!(window.average(), 0.0);
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn test_record_adapt() {
    let mut metrics = ForestMetrics::new();
    let stats = AdaptStats {
      refined: 3,
      notices: 40,
      elapsed_us: 12,
      ..Default::default()
    };
    metrics.record_adapt(&stats);
    assert_eq!(metrics.total_refined, 3);
    assert_eq!(metrics.notices.min_max(), Some((40, 40)));
    assert_eq!(metrics.last_adapt, Some(stats));
  }
}
