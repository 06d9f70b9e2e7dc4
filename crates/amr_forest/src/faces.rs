//! Face, edge and corner enumeration.
//!
//! Everything here is a pure function of the rank: offset sequences are built
//! once into a [`FaceOffsets`] table and iterated as often as needed.
//!
//! # Conventions
//!
//! ```text
//! Face index:   XM=0  XP=1  YM=2  YP=3  ZM=4  ZP=5     opposite = face ^ 1
//! FaceOffset:   [-1|0|1; 3]   (faces, edges and corners; never all zero)
//! ChildOffset:  [0|1; 3]      bit0 = x, bit1 = y, bit2 = z
//! ```

use std::fmt;
use std::ops::Neg;

use smallvec::SmallVec;

use crate::constants::{MAX_RANK, NUM_OFFSETS};

/// One of the `2 * rank` faces of a tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Face(u8);

impl Face {
  pub const XM: Face = Face(0);
  pub const XP: Face = Face(1);
  pub const YM: Face = Face(2);
  pub const YP: Face = Face(3);
  pub const ZM: Face = Face(4);
  pub const ZP: Face = Face(5);

  /// Face on `axis`, upper side when `upper` is set.
  #[inline]
  pub fn new(axis: usize, upper: bool) -> Self {
    assert!(axis < MAX_RANK, "face axis {axis} out of range");
    Face((2 * axis + upper as usize) as u8)
  }

  /// Face from its raw index.
  ///
  /// # Panics
  /// Panics when `index >= 6`.
  #[inline]
  pub fn from_index(index: usize) -> Self {
    assert!(index < 2 * MAX_RANK, "face index {index} out of range");
    Face(index as u8)
  }

  /// All faces for a rank, in index order.
  pub fn all(rank: usize) -> impl Iterator<Item = Face> {
    (0..2 * rank as u8).map(Face)
  }

  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }

  #[inline]
  pub fn axis(self) -> usize {
    (self.0 >> 1) as usize
  }

  #[inline]
  pub fn is_upper(self) -> bool {
    self.0 & 1 == 1
  }

  /// The face on the other side of the same axis.
  #[inline]
  pub fn opposite(self) -> Self {
    Face(self.0 ^ 1)
  }

  /// Unit step along the face normal.
  #[inline]
  pub fn sign(self) -> i8 {
    if self.is_upper() {
      1
    } else {
      -1
    }
  }

  /// The face as a direction offset.
  pub fn offset(self) -> FaceOffset {
    let mut offset = [0i8; 3];
    offset[self.axis()] = self.sign();
    FaceOffset(offset)
  }
}

/// Direction in `{-1, 0, 1}^3` naming a face, edge or corner neighbor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct FaceOffset(pub [i8; 3]);

impl FaceOffset {
  pub const ZERO: FaceOffset = FaceOffset([0, 0, 0]);

  #[inline]
  pub fn new(x: i8, y: i8, z: i8) -> Self {
    Self([x, y, z])
  }

  #[inline]
  pub fn get(self, axis: usize) -> i8 {
    self.0[axis]
  }

  #[inline]
  pub fn is_zero(self) -> bool {
    self.0 == [0, 0, 0]
  }

  /// Number of axes the offset crosses (1 = face, 2 = edge, 3 = corner).
  #[inline]
  pub fn crossings(self) -> usize {
    self.0.iter().filter(|&&v| v != 0).count()
  }

  /// Dimension of the shared boundary element for a rank.
  ///
  /// In 3-D faces have rank 2, edges rank 1 and corners rank 0.
  #[inline]
  pub fn face_rank(self, rank: usize) -> usize {
    rank - self.crossings()
  }

  /// Dense slot in `0..27`, suitable for fixed-size per-direction tables.
  #[inline]
  pub fn slot(self) -> usize {
    let [x, y, z] = self.0;
    ((x + 1) + 3 * ((y + 1) + 3 * (z + 1))) as usize
  }

  /// Inverse of [`slot`](Self::slot).
  pub fn from_slot(slot: usize) -> Self {
    assert!(slot < NUM_OFFSETS, "face slot {slot} out of range");
    let s = slot as i8;
    Self([s % 3 - 1, (s / 3) % 3 - 1, s / 9 - 1])
  }

  /// Whether the offset only uses the first `rank` axes.
  #[inline]
  pub fn fits_rank(self, rank: usize) -> bool {
    self.0[rank..].iter().all(|&v| v == 0)
  }

  /// The single face this offset names, if it crosses exactly one axis.
  pub fn as_face(self) -> Option<Face> {
    if self.crossings() != 1 {
      return None;
    }
    let axis = self.0.iter().position(|&v| v != 0)?;
    Some(Face::new(axis, self.0[axis] > 0))
  }

  /// Direction of the parent's neighbor that contains this child's neighbor.
  ///
  /// Axes on which the step stays inside the parent are zeroed, so a result
  /// of [`ZERO`](Self::ZERO) means the neighbor is a sibling.
  pub fn parent_face(self, child: ChildOffset) -> FaceOffset {
    let mut out = self.0;
    for (axis, value) in out.iter_mut().enumerate() {
      let inward = (*value == 1 && child.0[axis] == 0) || (*value == -1 && child.0[axis] == 1);
      if inward {
        *value = 0;
      }
    }
    FaceOffset(out)
  }

  /// True when the step from `child` leaves the parent through this same
  /// face, edge or corner.
  #[inline]
  pub fn exits_parent(self, child: ChildOffset) -> bool {
    self.parent_face(child) == self
  }
}

impl Neg for FaceOffset {
  type Output = FaceOffset;

  fn neg(self) -> FaceOffset {
    FaceOffset([-self.0[0], -self.0[1], -self.0[2]])
  }
}

impl From<Face> for FaceOffset {
  fn from(face: Face) -> Self {
    face.offset()
  }
}

impl fmt::Display for FaceOffset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({:+},{:+},{:+})", self.0[0], self.0[1], self.0[2])
  }
}

/// Position of a child inside its parent for the 2-per-axis actor forest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct ChildOffset(pub [u8; 3]);

impl ChildOffset {
  #[inline]
  pub fn new(x: u8, y: u8, z: u8) -> Self {
    debug_assert!(x < 2 && y < 2 && z < 2, "child offset out of range");
    Self([x, y, z])
  }

  /// Octant number: bit0 = x, bit1 = y, bit2 = z.
  #[inline]
  pub fn index(self) -> usize {
    (self.0[0] | (self.0[1] << 1) | (self.0[2] << 2)) as usize
  }

  /// Inverse of [`index`](Self::index).
  ///
  /// # Panics
  /// Panics when `index >= 8`.
  pub fn from_index(index: usize) -> Self {
    assert!(index < 8, "child index {index} out of range");
    let i = index as u8;
    Self([i & 1, (i >> 1) & 1, (i >> 2) & 1])
  }

  #[inline]
  pub fn get(self, axis: usize) -> u8 {
    self.0[axis]
  }

  /// All `2^rank` children in octant order.
  pub fn all(rank: usize) -> impl Iterator<Item = ChildOffset> {
    (0..1usize << rank).map(ChildOffset::from_index)
  }

  /// Children that touch the parent's boundary in direction `face`.
  pub fn adjacent_to(rank: usize, face: FaceOffset) -> SmallVec<[ChildOffset; 8]> {
    Self::all(rank)
      .filter(|child| {
        (0..rank).all(|axis| match face.0[axis] {
          1 => child.0[axis] == 1,
          -1 => child.0[axis] == 0,
          _ => true,
        })
      })
      .collect()
  }
}

/// Precomputed, restartable sequence of direction offsets for one rank.
///
/// `min_face_rank` filters by boundary element: 0 keeps faces, edges and
/// corners; `rank - 1` keeps faces only.
#[derive(Clone, Debug)]
pub struct FaceOffsets {
  rank: usize,
  offsets: SmallVec<[FaceOffset; 26]>,
}

impl FaceOffsets {
  pub fn new(rank: usize, min_face_rank: usize) -> Self {
    assert!((1..=MAX_RANK).contains(&rank), "rank {rank} out of range");
    let offsets = (0..NUM_OFFSETS)
      .map(FaceOffset::from_slot)
      .filter(|offset| !offset.is_zero() && offset.fits_rank(rank))
      .filter(|offset| offset.face_rank(rank) >= min_face_rank)
      .collect();
    Self { rank, offsets }
  }

  /// Faces, edges and corners.
  pub fn all(rank: usize) -> Self {
    Self::new(rank, 0)
  }

  #[inline]
  pub fn rank(&self) -> usize {
    self.rank
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.offsets.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.offsets.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = FaceOffset> + '_ {
    self.offsets.iter().copied()
  }

  /// Offsets whose step from `child` leaves the parent through `parent_face`.
  pub fn through_parent_face(
    &self,
    child: ChildOffset,
    parent_face: FaceOffset,
  ) -> impl Iterator<Item = FaceOffset> + '_ {
    self
      .iter()
      .filter(move |offset| offset.parent_face(child) == parent_face)
  }
}

#[cfg(test)]
#[path = "faces_test.rs"]
mod faces_test;
