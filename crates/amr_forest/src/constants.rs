//! Forest-wide constants: index bit layout and enumeration sizes.
//!
//! # Index Layout
//!
//! Each axis of a [`ForestIndex`](crate::ForestIndex) packs into one `u32`:
//!
//! ```text
//!  31 30 29 ........ 20 19 ................ 0
//! ┌─────┬──────────────┬────────────────────┐
//! │ lvl │ array (10)   │ tree path (20)     │
//! └─────┴──────────────┴────────────────────┘
//! ```
//!
//! The tree path is a fixed-point coordinate inside the root block: the
//! branch taken at level `L` lives at bit `INDEX_TREE_BITS - L`, so level 1
//! occupies the most significant path bit.

/// Bits per axis reserved for the root-array position.
pub const INDEX_ARRAY_BITS: u32 = 10;

/// Bits per axis reserved for the tree path.
pub const INDEX_TREE_BITS: u32 = 20;

/// Bits per axis reserved for that axis' share of the level.
pub const INDEX_LEVEL_BITS: u32 = 2;

/// Radix used to combine per-axis level fields into one scalar.
pub const INDEX_LEVEL_RADIX: u32 = 1 << INDEX_LEVEL_BITS;

/// Deepest level addressable by the tree path.
pub const INDEX_MAX_LEVEL: i32 = INDEX_TREE_BITS as i32;

/// Largest root-array extent per axis.
pub const INDEX_MAX_ARRAY: u32 = 1 << INDEX_ARRAY_BITS;

/// Mask selecting the tree-path bits.
pub const INDEX_TREE_MASK: u32 = (1 << INDEX_TREE_BITS) - 1;

/// Carry bit set when a neighbor step leaves the root block.
pub const INDEX_TREE_OVERFLOW: u32 = 1 << INDEX_TREE_BITS;

/// Maximum spatial rank.
pub const MAX_RANK: usize = 3;

/// Number of face neighbors per node for rank 3.
pub const MAX_FACES: usize = 2 * MAX_RANK;

/// Number of offsets in `{-1, 0, 1}^3`, including the zero offset.
pub const NUM_OFFSETS: usize = 27;

/// Supported octree branching factors.
pub const SUPPORTED_BRANCHING: [usize; 4] = [2, 4, 8, 16];
