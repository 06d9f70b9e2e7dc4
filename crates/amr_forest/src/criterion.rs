//! Refinement criteria and initial conditions.
//!
//! A criterion looks at one leaf block and votes [`Adapt::Coarsen`],
//! [`Adapt::Same`] or [`Adapt::Refine`]. Several criteria combine with
//! [`Adapt::reduce`]: any refine vote wins, and a block coarsens only when
//! every criterion agrees.

use glam::DVec3;

use crate::bounds::DAabb3;
use crate::field::{CellBox, FieldAccess, FieldBlock};
use crate::index::ForestIndex;

/// A criterion's vote for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Adapt {
  Coarsen,
  Same,
  Refine,
}

impl Adapt {
  /// Level change requested by the vote.
  #[inline]
  pub fn delta(self) -> i32 {
    match self {
      Adapt::Coarsen => -1,
      Adapt::Same => 0,
      Adapt::Refine => 1,
    }
  }

  /// Combine votes: refine if anyone refines, coarsen only if everyone
  /// coarsens. No votes means [`Adapt::Same`].
  pub fn reduce(votes: impl IntoIterator<Item = Adapt>) -> Adapt {
    let mut any = false;
    let mut all_coarsen = true;
    for vote in votes {
      any = true;
      match vote {
        Adapt::Refine => return Adapt::Refine,
        Adapt::Same => all_coarsen = false,
        Adapt::Coarsen => {}
      }
    }
    if any && all_coarsen {
      Adapt::Coarsen
    } else {
      Adapt::Same
    }
  }
}

/// Read-only view of a leaf handed to criteria.
#[derive(Clone, Copy, Debug)]
pub struct BlockView<'a> {
  pub index: &'a ForestIndex,
  pub level: i32,
  pub bounds: DAabb3,
  pub data: &'a FieldBlock,
}

/// Per-block refinement decision.
pub trait RefineCriterion: Send + Sync {
  fn evaluate(&self, block: &BlockView<'_>) -> Adapt;
}

/// Every criterion in the set votes; the votes are reduced.
#[derive(Default)]
pub struct CriterionSet {
  criteria: Vec<Box<dyn RefineCriterion>>,
}

impl CriterionSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, criterion: impl RefineCriterion + 'static) -> Self {
    self.criteria.push(Box::new(criterion));
    self
  }

  pub fn push(&mut self, criterion: Box<dyn RefineCriterion>) {
    self.criteria.push(criterion);
  }

  pub fn len(&self) -> usize {
    self.criteria.len()
  }

  pub fn is_empty(&self) -> bool {
    self.criteria.is_empty()
  }
}

impl RefineCriterion for CriterionSet {
  fn evaluate(&self, block: &BlockView<'_>) -> Adapt {
    Adapt::reduce(self.criteria.iter().map(|c| c.evaluate(block)))
  }
}

/// Votes from the largest interior value of one field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueThreshold {
  pub field: usize,
  /// Refine when the maximum exceeds this.
  pub refine_above: f64,
  /// Coarsen when the maximum falls below this.
  pub coarsen_below: f64,
}

impl RefineCriterion for ValueThreshold {
  fn evaluate(&self, block: &BlockView<'_>) -> Adapt {
    let data = block.data;
    let max = CellBox::interior(data.size())
      .cells()
      .map(|cell| data.get(self.field, cell))
      .fold(f64::NEG_INFINITY, f64::max);
    classify(max, self.refine_above, self.coarsen_below)
  }
}

/// Votes from the largest jump between adjacent interior cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slope {
  pub field: usize,
  pub refine_above: f64,
  pub coarsen_below: f64,
}

impl RefineCriterion for Slope {
  fn evaluate(&self, block: &BlockView<'_>) -> Adapt {
    let data = block.data;
    let size = data.size();
    let mut max = 0.0f64;
    for cell in CellBox::interior(size).cells() {
      let here = data.get(self.field, cell);
      for axis in 0..3 {
        if cell[axis] + 1 >= size[axis] as isize {
          continue;
        }
        let mut next = cell;
        next[axis] += 1;
        max = max.max((data.get(self.field, next) - here).abs());
      }
    }
    classify(max, self.refine_above, self.coarsen_below)
  }
}

fn classify(value: f64, refine_above: f64, coarsen_below: f64) -> Adapt {
  if value > refine_above {
    Adapt::Refine
  } else if value < coarsen_below {
    Adapt::Coarsen
  } else {
    Adapt::Same
  }
}

/// Field values at a point, used to fill blocks that have no history yet.
pub trait InitialCondition: Send + Sync {
  fn value(&self, field: usize, position: DVec3) -> f64;
}

impl<F> InitialCondition for F
where
  F: Fn(usize, DVec3) -> f64 + Send + Sync,
{
  fn value(&self, field: usize, position: DVec3) -> f64 {
    self(field, position)
  }
}
