//! ForestIndex - fixed-width address of any block in the forest.
//!
//! An index names a root-array cell plus a path down its octree. Parents,
//! children and neighbors are computed by bit arithmetic alone, so two actors
//! can name each other without sharing any tree structure.
//!
//! # Neighbor Stepping
//!
//! The per-axis tree path is a fixed-point coordinate. Stepping toward a
//! neighbor adds `±1` at the current level's bit; a carry out of the top path
//! bit moves the array position instead (with periodic wraparound):
//!
//! ```text
//! level 2, path 11 + 1  ->  path 00, carry  ->  array + 1
//! level 2, path 00 - 1  ->  path 11, borrow ->  array - 1
//! ```

use std::fmt;

use crate::constants::{
  INDEX_ARRAY_BITS, INDEX_LEVEL_RADIX, INDEX_MAX_ARRAY, INDEX_MAX_LEVEL, INDEX_TREE_BITS,
  INDEX_TREE_MASK, INDEX_TREE_OVERFLOW,
};
use crate::faces::{ChildOffset, FaceOffset};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
struct AxisIndex {
  array: u32,
  tree: u32,
  level: u32,
}

/// Address of a block: root-array position, tree path and level.
///
/// Ordering is lexicographic over the packed axes; it is stable but carries
/// no spatial meaning beyond making indices usable as ordered map keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct ForestIndex {
  axes: [AxisIndex; 3],
}

impl ForestIndex {
  /// Root block at the given array position.
  ///
  /// # Panics
  /// Panics if any coordinate exceeds the array bit width.
  pub fn new(x: u32, y: u32, z: u32) -> Self {
    let mut index = Self::default();
    for (axis, value) in [x, y, z].into_iter().enumerate() {
      assert!(value < INDEX_MAX_ARRAY, "array position {value} exceeds index width");
      index.axes[axis].array = value;
    }
    index
  }

  /// Combined level from the per-axis level fields.
  #[inline]
  pub fn level(&self) -> i32 {
    let [a0, a1, a2] = self.axes;
    (a0.level + INDEX_LEVEL_RADIX * (a1.level + INDEX_LEVEL_RADIX * a2.level)) as i32
  }

  /// Set the combined level and zero path bits below it.
  ///
  /// # Panics
  /// Panics if `level` is negative or beyond [`INDEX_MAX_LEVEL`].
  pub fn set_level(&mut self, level: i32) {
    assert!(
      (0..=INDEX_MAX_LEVEL).contains(&level),
      "level {level} outside 0..={INDEX_MAX_LEVEL}"
    );
    let level = level as u32;
    self.axes[0].level = level % INDEX_LEVEL_RADIX;
    self.axes[1].level = (level / INDEX_LEVEL_RADIX) % INDEX_LEVEL_RADIX;
    self.axes[2].level = level / (INDEX_LEVEL_RADIX * INDEX_LEVEL_RADIX);
    self.clean();
  }

  /// Zero every path bit deeper than the current level.
  pub fn clean(&mut self) {
    let keep = INDEX_TREE_MASK & !((1u32 << (INDEX_TREE_BITS - self.level() as u32)) - 1);
    for axis in &mut self.axes {
      axis.tree &= keep;
    }
  }

  #[inline]
  pub fn is_root(&self) -> bool {
    self.level() == 0
  }

  /// Branch taken at `level` on each axis.
  ///
  /// # Panics
  /// Panics if `level` is not in `1..=INDEX_MAX_LEVEL`.
  pub fn child(&self, level: i32) -> ChildOffset {
    let shift = Self::path_shift(level);
    let bit = |axis: usize| ((self.axes[axis].tree >> shift) & 1) as u8;
    ChildOffset([bit(0), bit(1), bit(2)])
  }

  /// Position of this block within its parent.
  #[inline]
  pub fn child_offset(&self) -> ChildOffset {
    self.child(self.level())
  }

  fn set_child(&mut self, level: i32, child: ChildOffset) {
    let shift = Self::path_shift(level);
    for (axis, state) in self.axes.iter_mut().enumerate() {
      state.tree = (state.tree & !(1 << shift)) | ((child.0[axis] as u32 & 1) << shift);
    }
  }

  fn path_shift(level: i32) -> u32 {
    assert!(
      (1..=INDEX_MAX_LEVEL).contains(&level),
      "tree level {level} outside 1..={INDEX_MAX_LEVEL}"
    );
    INDEX_TREE_BITS - level as u32
  }

  /// Index of the parent block.
  ///
  /// # Panics
  /// Panics at level 0: a root block has no parent.
  pub fn index_parent(&self) -> Self {
    let level = self.level();
    assert!(level > 0, "index_parent called on root index {self}");
    let mut parent = *self;
    parent.set_child(level, ChildOffset::default());
    parent.set_level(level - 1);
    parent
  }

  /// Parent index, or `None` for a root.
  #[inline]
  pub fn parent(&self) -> Option<Self> {
    (!self.is_root()).then(|| self.index_parent())
  }

  /// Index of the child at `child`.
  ///
  /// # Panics
  /// Panics when already at [`INDEX_MAX_LEVEL`].
  pub fn index_child(&self, child: ChildOffset) -> Self {
    let level = self.level() + 1;
    let mut index = *self;
    index.set_level(level);
    index.set_child(level, child);
    index
  }

  /// Same-level index one step across `face`, wrapping the array position
  /// modulo `extent`.
  pub fn index_neighbor(&self, face: FaceOffset, extent: [u32; 3]) -> Self {
    let level = self.level() as u32;
    let step = 1i64 << (INDEX_TREE_BITS - level);
    let mut index = *self;
    for (axis, state) in index.axes.iter_mut().enumerate() {
      let direction = face.0[axis] as i64;
      if direction == 0 {
        continue;
      }
      let (tree, carry) = Self::step_tree(state.tree, step * direction);
      state.tree = tree;
      if carry != 0 {
        let n = extent[axis] as i64;
        state.array = (state.array as i64 + carry).rem_euclid(n) as u32;
      }
    }
    index
  }

  /// Whether stepping across `face` leaves a non-periodic domain.
  pub fn is_on_boundary(&self, face: FaceOffset, extent: [u32; 3], periodic: [bool; 3]) -> bool {
    let level = self.level() as u32;
    let step = 1i64 << (INDEX_TREE_BITS - level);
    (0..3).any(|axis| {
      let direction = face.0[axis] as i64;
      if direction == 0 || periodic[axis] {
        return false;
      }
      let (_, carry) = Self::step_tree(self.axes[axis].tree, step * direction);
      let array = self.axes[axis].array as i64 + carry;
      carry != 0 && !(0..extent[axis] as i64).contains(&array)
    })
  }

  /// Add `delta` to a path, returning the wrapped path and the array carry.
  fn step_tree(tree: u32, delta: i64) -> (u32, i64) {
    let sum = tree as i64 + delta;
    if sum < 0 {
      ((sum + INDEX_TREE_OVERFLOW as i64) as u32, -1)
    } else if sum >= INDEX_TREE_OVERFLOW as i64 {
      ((sum - INDEX_TREE_OVERFLOW as i64) as u32, 1)
    } else {
      (sum as u32, 0)
    }
  }

  /// Same parent, same level, different block.
  pub fn is_sibling(&self, other: &ForestIndex) -> bool {
    self != other
      && !self.is_root()
      && self.level() == other.level()
      && self.index_parent() == other.index_parent()
  }

  /// Whether `self` is a child of one of `uncle`'s siblings.
  pub fn is_nephew_of(&self, uncle: &ForestIndex) -> bool {
    self.level() == uncle.level() + 1
      && self.level() > 1
      && self.index_parent().is_sibling(uncle)
  }

  /// Root-array position on `axis`.
  #[inline]
  pub fn array(&self, axis: usize) -> u32 {
    self.axes[axis].array
  }

  /// Raw path bits on `axis`.
  #[inline]
  pub fn tree(&self, axis: usize) -> u32 {
    self.axes[axis].tree
  }

  /// Integer coordinate of the block among all blocks of its level.
  pub fn coordinate(&self, axis: usize) -> u64 {
    let level = self.level() as u32;
    let local = (self.axes[axis].tree >> (INDEX_TREE_BITS - level)) as u64;
    ((self.axes[axis].array as u64) << level) + local
  }

  /// Pack into three words (`level:2 | array:10 | tree:20` per axis).
  pub fn to_words(&self) -> [u32; 3] {
    self.axes.map(|axis| {
      (axis.level << (INDEX_ARRAY_BITS + INDEX_TREE_BITS)) | (axis.array << INDEX_TREE_BITS) | axis.tree
    })
  }

  /// Inverse of [`to_words`](Self::to_words).
  pub fn from_words(words: [u32; 3]) -> Self {
    let unpack = |word: u32| AxisIndex {
      level: word >> (INDEX_ARRAY_BITS + INDEX_TREE_BITS),
      array: (word >> INDEX_TREE_BITS) & (INDEX_MAX_ARRAY - 1),
      tree: word & INDEX_TREE_MASK,
    };
    Self {
      axes: words.map(unpack),
    }
  }

  /// Debug rendering: array bits, then `:` and the path bits per axis.
  pub fn bit_string(&self, rank: usize) -> String {
    let level = self.level();
    let mut out = String::new();
    for axis in 0..rank {
      if axis > 0 {
        out.push(' ');
      }
      out.push_str(&format!("{:b}:", self.axes[axis].array));
      for l in 1..=level {
        let bit = (self.axes[axis].tree >> (INDEX_TREE_BITS - l as u32)) & 1;
        out.push(if bit == 1 { '1' } else { '0' });
      }
    }
    out
  }
}

impl fmt::Display for ForestIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "L{}[{}]", self.level(), self.bit_string(3))
  }
}

#[cfg(test)]
#[path = "index_test.rs"]
mod index_test;
