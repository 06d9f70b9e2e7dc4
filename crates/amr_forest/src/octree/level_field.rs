//! LevelField - rasterized requested-level map driving `refine`.
//!
//! A cell holding `v` asks every node covering it at levels `0..=v` to
//! refine; negative values ask for nothing. Node bounds
//! are half-open cell ranges, split into `k` parts per axis at
//! `low + i * (up - low) / k`.

/// Half-open cell range `[low, up)` per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeBounds {
  pub low: [usize; 3],
  pub up: [usize; 3],
}

impl NodeBounds {
  pub fn new(low: [usize; 3], up: [usize; 3]) -> Self {
    debug_assert!((0..3).all(|axis| low[axis] <= up[axis]), "inverted bounds");
    Self { low, up }
  }

  #[inline]
  pub fn span(&self, axis: usize) -> usize {
    self.up[axis] - self.low[axis]
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    (0..3).any(|axis| self.span(axis) == 0)
  }

  /// Every active axis spans at least `k` cells.
  pub fn is_subdivisible(&self, k: usize, rank: usize) -> bool {
    (0..rank).all(|axis| self.span(axis) >= k)
  }

  /// Bounds of child `coords` when split `k` ways on each active axis.
  pub fn split(&self, k: usize, rank: usize, coords: [usize; 3]) -> NodeBounds {
    let mut child = *self;
    for axis in 0..rank {
      let span = self.span(axis);
      child.low[axis] = self.low[axis] + coords[axis] * span / k;
      child.up[axis] = self.low[axis] + (coords[axis] + 1) * span / k;
    }
    child
  }
}

/// Dense requested-level raster.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelField {
  dims: [usize; 3],
  values: Vec<i32>,
}

impl LevelField {
  /// A field of the given extent filled with level 0, which refines the
  /// root once.
  pub fn new(dims: [usize; 3]) -> Self {
    let dims = dims.map(|d| d.max(1));
    Self {
      dims,
      values: vec![0; dims[0] * dims[1] * dims[2]],
    }
  }

  /// Build from a function of cell coordinates.
  pub fn from_fn(dims: [usize; 3], mut f: impl FnMut([usize; 3]) -> i32) -> Self {
    let mut field = Self::new(dims);
    for z in 0..field.dims[2] {
      for y in 0..field.dims[1] {
        for x in 0..field.dims[0] {
          let i = field.offset([x, y, z]);
          field.values[i] = f([x, y, z]);
        }
      }
    }
    field
  }

  #[inline]
  pub fn dims(&self) -> [usize; 3] {
    self.dims
  }

  #[inline]
  fn offset(&self, cell: [usize; 3]) -> usize {
    cell[0] + self.dims[0] * (cell[1] + self.dims[1] * cell[2])
  }

  #[inline]
  pub fn get(&self, cell: [usize; 3]) -> i32 {
    self.values[self.offset(cell)]
  }

  #[inline]
  pub fn set(&mut self, cell: [usize; 3], level: i32) {
    let i = self.offset(cell);
    self.values[i] = level;
  }

  /// Bounds covering the whole field.
  pub fn bounds(&self) -> NodeBounds {
    NodeBounds::new([0; 3], self.dims)
  }

  /// Highest requested level inside `bounds`, `None` when empty.
  pub fn max_in(&self, bounds: &NodeBounds) -> Option<i32> {
    if bounds.is_empty() {
      return None;
    }
    let mut best = i32::MIN;
    for z in bounds.low[2]..bounds.up[2] {
      for y in bounds.low[1]..bounds.up[1] {
        let row = self.offset([bounds.low[0], y, z]);
        let span = bounds.span(0);
        if let Some(&m) = self.values[row..row + span].iter().max() {
          best = best.max(m);
        }
      }
    }
    Some(best)
  }

  /// Whether any cell inside `bounds` asks a node at `level` to refine.
  #[inline]
  pub fn requests_at(&self, bounds: &NodeBounds, level: i32) -> bool {
    self.max_in(bounds).is_some_and(|m| m >= level)
  }
}
