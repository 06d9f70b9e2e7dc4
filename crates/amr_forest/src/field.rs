//! Field storage seen through [`FieldAccess`].
//!
//! Blocks hold `size` interior cells per axis surrounded by `ghost` layers.
//! Cell coordinates are interior-relative: `0..size` is the interior and
//! ghost cells sit at negative coordinates or at `size..size + ghost`.
//!
//! ```text
//!  -g      0                       n      n+g
//!   │ ghost │        interior       │ ghost │
//! ```

use crate::faces::FaceOffset;

/// Accessor the mesh core reads and writes through; storage stays with the
/// implementor.
pub trait FieldAccess {
  /// Number of fields stored per cell.
  fn field_count(&self) -> usize;

  /// Interior cells per axis.
  fn size(&self) -> [usize; 3];

  /// Ghost layers per axis.
  fn ghost_depth(&self) -> [usize; 3];

  /// Ghost-inclusive values of `field`, x fastest.
  fn values(&self, field: usize) -> &[f64];

  fn values_mut(&mut self, field: usize) -> &mut [f64];
}

/// Half-open box of interior-relative cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellBox {
  pub low: [isize; 3],
  pub up: [isize; 3],
}

impl CellBox {
  pub fn new(low: [isize; 3], up: [isize; 3]) -> Self {
    Self { low, up }
  }

  /// The interior `0..size` on every axis.
  pub fn interior(size: [usize; 3]) -> Self {
    Self::new([0; 3], size.map(|n| n as isize))
  }

  /// Interior cells adjacent to `face`, `thickness` deep on crossed axes.
  pub fn slab(size: [usize; 3], face: FaceOffset, thickness: [usize; 3]) -> Self {
    let mut cells = Self::interior(size);
    for axis in 0..3 {
      let (n, t) = (size[axis] as isize, thickness[axis] as isize);
      match face.get(axis) {
        1 => cells.low[axis] = n - t,
        -1 => cells.up[axis] = t,
        _ => {}
      }
    }
    cells
  }

  /// Ghost cells outside `face`, covering the interior extent on the axes the
  /// direction does not cross.
  pub fn ghost(size: [usize; 3], ghost: [usize; 3], face: FaceOffset) -> Self {
    let mut cells = Self::interior(size);
    for axis in 0..3 {
      let (n, g) = (size[axis] as isize, ghost[axis] as isize);
      match face.get(axis) {
        1 => {
          cells.low[axis] = n;
          cells.up[axis] = n + g;
        }
        -1 => {
          cells.low[axis] = -g;
          cells.up[axis] = 0;
        }
        _ => {}
      }
    }
    cells
  }

  #[inline]
  pub fn extent(&self, axis: usize) -> usize {
    (self.up[axis] - self.low[axis]).max(0) as usize
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.extent(0) * self.extent(1) * self.extent(2)
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Shift by `delta` cells.
  pub fn translate(&self, delta: [isize; 3]) -> Self {
    Self::new(
      [0, 1, 2].map(|a| self.low[a] + delta[a]),
      [0, 1, 2].map(|a| self.up[a] + delta[a]),
    )
  }

  /// Cells in x-fastest order.
  pub fn cells(&self) -> impl Iterator<Item = [isize; 3]> + '_ {
    let [x0, y0, z0] = self.low;
    let [x1, y1, z1] = self.up;
    (z0..z1).flat_map(move |z| (y0..y1).flat_map(move |y| (x0..x1).map(move |x| [x, y, z])))
  }
}

/// Offset of an interior-relative cell inside ghost-inclusive storage.
#[inline]
pub fn storage_offset(size: [usize; 3], ghost: [usize; 3], cell: [isize; 3]) -> usize {
  let dims = [0, 1, 2].map(|a| size[a] + 2 * ghost[a]);
  let at = |a: usize| {
    let i = cell[a] + ghost[a] as isize;
    debug_assert!(i >= 0 && (i as usize) < dims[a], "cell {cell:?} outside storage");
    i as usize
  };
  at(0) + dims[0] * (at(1) + dims[1] * at(2))
}

/// Read `cells` of each listed field, concatenated field after field.
pub fn gather<F: FieldAccess + ?Sized>(block: &F, fields: &[usize], cells: &CellBox) -> Vec<f64> {
  let (size, ghost) = (block.size(), block.ghost_depth());
  let mut out = Vec::with_capacity(fields.len() * cells.len());
  for &field in fields {
    let values = block.values(field);
    out.extend(cells.cells().map(|cell| values[storage_offset(size, ghost, cell)]));
  }
  out
}

/// Write `payload` (as produced by [`gather`]) into `cells`.
///
/// # Panics
/// Panics when the payload length does not match the region.
pub fn scatter<F: FieldAccess + ?Sized>(
  block: &mut F,
  fields: &[usize],
  cells: &CellBox,
  payload: &[f64],
) {
  assert_eq!(
    payload.len(),
    fields.len() * cells.len(),
    "payload does not match {} fields over {cells:?}",
    fields.len()
  );
  let (size, ghost) = (block.size(), block.ghost_depth());
  for (chunk, &field) in payload.chunks(cells.len().max(1)).zip(fields) {
    let values = block.values_mut(field);
    for (value, cell) in chunk.iter().zip(cells.cells()) {
      values[storage_offset(size, ghost, cell)] = *value;
    }
  }
}

/// Owned field storage for one block.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldBlock {
  size: [usize; 3],
  ghost: [usize; 3],
  values: Vec<Vec<f64>>,
}

impl FieldBlock {
  /// Zero-filled storage for `fields` fields.
  pub fn new(size: [usize; 3], ghost: [usize; 3], fields: usize) -> Self {
    let len = (0..3).map(|a| size[a] + 2 * ghost[a]).product();
    Self {
      size,
      ghost,
      values: vec![vec![0.0; len]; fields],
    }
  }

  /// Set every interior cell of `field` from a function of its coordinates.
  pub fn fill_interior(&mut self, field: usize, mut f: impl FnMut([isize; 3]) -> f64) {
    let (size, ghost) = (self.size, self.ghost);
    let values = &mut self.values[field];
    for cell in CellBox::interior(size).cells() {
      values[storage_offset(size, ghost, cell)] = f(cell);
    }
  }

  /// Value at an interior-relative cell.
  #[inline]
  pub fn get(&self, field: usize, cell: [isize; 3]) -> f64 {
    self.values[field][storage_offset(self.size, self.ghost, cell)]
  }

  #[inline]
  pub fn set(&mut self, field: usize, cell: [isize; 3], value: f64) {
    let offset = storage_offset(self.size, self.ghost, cell);
    self.values[field][offset] = value;
  }
}

impl FieldAccess for FieldBlock {
  fn field_count(&self) -> usize {
    self.values.len()
  }

  fn size(&self) -> [usize; 3] {
    self.size
  }

  fn ghost_depth(&self) -> [usize; 3] {
    self.ghost
  }

  fn values(&self, field: usize) -> &[f64] {
    &self.values[field]
  }

  fn values_mut(&mut self, field: usize) -> &mut [f64] {
    &mut self.values[field]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_slab_and_ghost_regions() {
    let size = [8, 8, 1];
    let slab = CellBox::slab(size, FaceOffset::new(1, 0, 0), [2, 2, 0]);
    assert_eq!(slab, CellBox::new([6, 0, 0], [8, 8, 1]));

    let ghost = CellBox::ghost(size, [2, 2, 0], FaceOffset::new(-1, 1, 0));
    assert_eq!(ghost, CellBox::new([-2, 8, 0], [0, 10, 1]));
    assert_eq!(ghost.len(), 4);
  }

  #[test]
  fn test_gather_scatter_roundtrip() {
    let mut block = FieldBlock::new([4, 4, 1], [1, 1, 0], 2);
    block.fill_interior(0, |c| (c[0] + 10 * c[1]) as f64);
    block.fill_interior(1, |c| -(c[0] as f64));

    let region = CellBox::slab([4, 4, 1], FaceOffset::new(0, -1, 0), [1, 1, 0]);
    let payload = gather(&block, &[0, 1], &region);
    assert_eq!(payload, vec![0.0, 1.0, 2.0, 3.0, 0.0, -1.0, -2.0, -3.0]);

    let target = CellBox::ghost([4, 4, 1], [1, 1, 0], FaceOffset::new(0, 1, 0));
    scatter(&mut block, &[0, 1], &target, &payload);
    assert_eq!(block.get(0, [2, 4, 0]), 2.0);
    assert_eq!(block.get(1, [3, 4, 0]), -3.0);
  }

  #[test]
  fn test_ghost_regions_partition_the_halo() {
    let (size, ghost) = ([4, 4, 4], [2, 2, 2]);
    let total: usize = crate::faces::FaceOffsets::all(3)
      .iter()
      .map(|face| CellBox::ghost(size, ghost, face).len())
      .sum();
    assert_eq!(total, 8 * 8 * 8 - 4 * 4 * 4);
  }
}
