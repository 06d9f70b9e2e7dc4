//! Per-round statistics returned by the forest driver.

use crate::block::MessageKind;
use crate::runtime::CounterSnapshot;

/// Statistics from one adaptation round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptStats {
  /// Whether this was an initial-mesh round.
  pub initial: bool,
  /// Level notices exchanged before quiescence (forwarded ones included).
  pub notices: usize,
  /// Blocks that refined.
  pub refined: usize,
  /// Parents that became leaves again.
  pub coarsened: usize,
  /// Leaves after the round.
  pub leaves: usize,
  /// Blocks (leaves and interior) after the round.
  pub blocks: usize,
  /// Messages that reached a retired block.
  pub dropped: usize,
  /// Wall time in microseconds.
  pub elapsed_us: u64,
}

impl AdaptStats {
  pub(crate) fn from_counters(delta: &CounterSnapshot, children_per_block: usize) -> Self {
    Self {
      notices: delta.sent(MessageKind::NeighborLevel),
      refined: delta.spawned / children_per_block,
      coarsened: delta.retired / children_per_block,
      dropped: delta.dropped,
      ..Default::default()
    }
  }

  /// Whether the round changed the mesh.
  #[inline]
  pub fn changed(&self) -> bool {
    self.refined > 0 || self.coarsened > 0
  }
}

/// Statistics from one ghost refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
  pub copies: usize,
  pub restricts: usize,
  pub prolongs: usize,
  /// Leaves that completed the refresh.
  pub completed: usize,
  pub leaves: usize,
  pub elapsed_us: u64,
}

impl RefreshStats {
  pub(crate) fn from_counters(delta: &CounterSnapshot) -> Self {
    Self {
      copies: delta.sent(MessageKind::GhostCopy),
      restricts: delta.sent(MessageKind::GhostRestrict),
      prolongs: delta.sent(MessageKind::GhostProlong),
      ..Default::default()
    }
  }

  #[inline]
  pub fn buffers(&self) -> usize {
    self.copies + self.restricts + self.prolongs
  }
}
