use super::*;
use crate::field::{gather, scatter, FieldBlock};

const EPS: f64 = 1e-12;

/// Fine 2-D block of `n`x`n` filled from cell-center coordinates.
fn fine_block(n: usize, f: impl Fn(f64, f64) -> f64) -> FieldBlock {
  let mut block = FieldBlock::new([n, n, 1], [2, 2, 0], 1);
  block.fill_interior(0, |c| f(c[0] as f64 + 0.5, c[1] as f64 + 0.5));
  block
}

/// Restrict the whole interior into a fresh coarse block of half size.
fn restricted(fine: &FieldBlock, rank: usize) -> FieldBlock {
  let size = fine.size();
  let coarse_size = [0, 1, 2].map(|a| if a < rank { size[a] / 2 } else { size[a] });
  let mut coarse = FieldBlock::new(coarse_size, fine.ghost_depth(), 1);
  let payload = restrict(fine, &[0], &CellBox::interior(size), rank);
  scatter(&mut coarse, &[0], &CellBox::interior(coarse_size), &payload);
  coarse
}

// =========================================================================
// Restrict Tests
// =========================================================================

/// Restriction averages each 2x2 group.
#[test]
fn test_restrict_averages() {
  let fine = fine_block(4, |x, y| x + 4.0 * y);
  let coarse = restricted(&fine, 2);
  // cells (0..2, 0..2) have centers x in {0.5, 1.5}, y in {0.5, 1.5}
  assert!((coarse.get(0, [0, 0, 0]) - (1.0 + 4.0)).abs() < EPS);
  assert!((coarse.get(0, [1, 1, 0]) - (3.0 + 12.0)).abs() < EPS);
}

/// coarse_box halves only the active axes.
#[test]
fn test_coarse_box_rank() {
  let fine = CellBox::new([2, 4, 0], [6, 8, 1]);
  assert_eq!(coarse_box(&fine, 2), CellBox::new([1, 2, 0], [3, 4, 1]));
}

// =========================================================================
// Round-Trip Tests
// =========================================================================

/// Restrict then prolong reproduces a constant exactly.
#[test]
fn test_roundtrip_constant() {
  let fine = fine_block(8, |_, _| 7.25);
  let coarse = restricted(&fine, 2);
  let back = prolong(&coarse, &[0], &CellBox::interior([8, 8, 1]), 2);
  assert!(back.iter().all(|v| (v - 7.25).abs() < EPS));
}

/// Restrict then prolong reproduces a linear ramp exactly.
#[test]
fn test_roundtrip_linear_ramp_2d() {
  let ramp = |x: f64, y: f64| 3.0 + 2.0 * x - 0.5 * y;
  let fine = fine_block(8, ramp);
  let coarse = restricted(&fine, 2);

  let region = CellBox::interior([8, 8, 1]);
  let back = prolong(&coarse, &[0], &region, 2);
  let expected = gather(&fine, &[0], &region);
  for (got, want) in back.iter().zip(&expected) {
    assert!((got - want).abs() < EPS, "got {got}, want {want}");
  }
}

/// Same in 3-D, including the corner cells that use one-sided slopes.
#[test]
fn test_roundtrip_linear_ramp_3d() {
  let mut fine = FieldBlock::new([4, 4, 4], [1, 1, 1], 1);
  fine.fill_interior(0, |c| 1.0 + c[0] as f64 - 2.0 * c[1] as f64 + 0.25 * c[2] as f64);
  let coarse = restricted(&fine, 3);

  let region = CellBox::interior([4, 4, 4]);
  let back = prolong(&coarse, &[0], &region, 3);
  let expected = gather(&fine, &[0], &region);
  for (got, want) in back.iter().zip(&expected) {
    assert!((got - want).abs() < EPS);
  }
}

/// Smooth non-linear data round-trips with small bounded error.
#[test]
fn test_roundtrip_quadratic_bounded() {
  let fine = fine_block(16, |x, y| 0.01 * (x * x + y * y));
  let coarse = restricted(&fine, 2);
  let region = CellBox::interior([16, 16, 1]);
  let back = prolong(&coarse, &[0], &region, 2);
  let expected = gather(&fine, &[0], &region);
  let worst = back
    .iter()
    .zip(&expected)
    .map(|(a, b)| (a - b).abs())
    .fold(0.0, f64::max);
  assert!(worst > 0.0, "quadratic data is not reproduced exactly");
  assert!(worst < 0.1, "error {worst} should stay small");
}

/// Prolonging a sub-box matches the same cells of a full prolongation.
#[test]
fn test_prolong_sub_box() {
  let coarse = restricted(&fine_block(8, |x, y| x * y), 2);
  let full = prolong(&coarse, &[0], &CellBox::interior([8, 8, 1]), 2);
  let sub_box = CellBox::new([6, 2, 0], [8, 5, 1]);
  let sub = prolong(&coarse, &[0], &sub_box, 2);
  for (value, cell) in sub.iter().zip(sub_box.cells()) {
    let i = (cell[0] + 8 * cell[1]) as usize;
    assert_eq!(*value, full[i]);
  }
}
