//! Level-transfer operators: restrict (fine → coarse) and prolong
//! (coarse → fine) over the active axes of a block.
//!
//! Both operators are exact for linear data: restriction averages the
//! `2^rank` fine cells under each coarse cell, and prolongation adds a
//! limited-stencil slope at the fine cell's quarter-cell offset.
//!
//! ```text
//! coarse:  |     c-1     |      c      |     c+1     |
//! fine:                  | 2c  | 2c+1  |
//!                          -¼      +¼      (offsets from c, in coarse cells)
//! ```

use crate::field::{storage_offset, CellBox, FieldAccess};

/// Coarse box covered by a fine box (extents halved on active axes).
pub fn coarse_box(fine: &CellBox, rank: usize) -> CellBox {
  let mut coarse = *fine;
  for axis in 0..rank {
    debug_assert!(
      fine.low[axis] % 2 == 0 && fine.up[axis] % 2 == 0,
      "restrict box {fine:?} not aligned on axis {axis}"
    );
    coarse.low[axis] = fine.low[axis].div_euclid(2);
    coarse.up[axis] = fine.up[axis].div_euclid(2);
  }
  coarse
}

/// Average fine cells in `fine` down to one value per coarse cell.
///
/// Output is ordered like [`gather`](crate::field::gather) over
/// [`coarse_box`]`(fine, rank)`.
pub fn restrict<F: FieldAccess + ?Sized>(
  block: &F,
  fields: &[usize],
  fine: &CellBox,
  rank: usize,
) -> Vec<f64> {
  let (size, ghost) = (block.size(), block.ghost_depth());
  let coarse = coarse_box(fine, rank);
  let weight = 1.0 / (1usize << rank) as f64;
  let children = CellBox::interior([0, 1, 2].map(|a| if a < rank { 2 } else { 1 }));

  let mut out = Vec::with_capacity(fields.len() * coarse.len());
  for &field in fields {
    let values = block.values(field);
    for cell in coarse.cells() {
      let sum: f64 = children
        .cells()
        .map(|sub| {
          let fine_cell = [0, 1, 2].map(|a| {
            if a < rank {
              2 * cell[a] + sub[a]
            } else {
              cell[a]
            }
          });
          values[storage_offset(size, ghost, fine_cell)]
        })
        .sum();
      out.push(sum * weight);
    }
  }
  out
}

/// Interpolate the block's interior onto `fine`, a box in the doubled
/// coordinate space where the interior spans `0..2 * size` on active axes.
pub fn prolong<F: FieldAccess + ?Sized>(
  block: &F,
  fields: &[usize],
  fine: &CellBox,
  rank: usize,
) -> Vec<f64> {
  let (size, ghost) = (block.size(), block.ghost_depth());
  let mut out = Vec::with_capacity(fields.len() * fine.len());
  for &field in fields {
    let values = block.values(field);
    let at = |cell: [isize; 3]| values[storage_offset(size, ghost, cell)];
    for cell in fine.cells() {
      let mut parent = cell;
      let mut offset = [0.0; 3];
      for axis in 0..rank {
        parent[axis] = cell[axis].div_euclid(2);
        offset[axis] = if cell[axis].rem_euclid(2) == 0 { -0.25 } else { 0.25 };
      }
      debug_assert!(
        (0..3).all(|a| (0..size[a] as isize).contains(&parent[a])),
        "prolong source {parent:?} outside interior"
      );
      let mut value = at(parent);
      for axis in 0..rank {
        value += offset[axis] * slope(&at, parent, axis, size[axis] as isize);
      }
      out.push(value);
    }
  }
  out
}

/// Centered difference inside the interior, one-sided at its edges.
fn slope(at: &impl Fn([isize; 3]) -> f64, cell: [isize; 3], axis: usize, n: isize) -> f64 {
  let step = |delta: isize| {
    let mut c = cell;
    c[axis] += delta;
    c
  };
  let has_low = cell[axis] > 0;
  let has_high = cell[axis] + 1 < n;
  match (has_low, has_high) {
    (true, true) => 0.5 * (at(step(1)) - at(step(-1))),
    (false, true) => at(step(1)) - at(cell),
    (true, false) => at(cell) - at(step(-1)),
    (false, false) => 0.0,
  }
}

#[cfg(test)]
#[path = "transfer_test.rs"]
mod transfer_test;
