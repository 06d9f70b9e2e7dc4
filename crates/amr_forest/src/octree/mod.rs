//! Generic k^d-ary tree engine.
//!
//! One [`Octree`] owns its nodes in an arena; children, parent and neighbor
//! links are [`NodeId`] handles. The tree is refined from a rasterized
//! [`LevelField`], brought to 2:1 balance, and coalesced where a subtree is
//! uniformly refined.
//!
//! # Level Convention
//!
//! Level 0 is the root; each refinement step adds `log2(k)` levels, so a
//! k = 4 tree has nodes at levels 0, 2, 4, ...
//!
//! # Module Structure
//!
//! - [`config`]: `TreeConfig`, `TreeShape`, `RefinePolicy`
//! - [`node`]: `NodeId` handles and arena records
//! - [`tree`]: arena, neighbor links, `cousin`, subtree deletion
//! - [`level_field`]: requested-level raster and node bounds
//! - `refine`, `balance`, `optimize`: the three structural passes
//! - [`stats`]: per-level counts

pub mod config;
pub mod level_field;
pub mod node;
pub mod stats;
pub mod tree;

mod balance;
mod optimize;
mod refine;

pub use config::{RefinePolicy, TreeConfig, TreeShape};
pub use level_field::{LevelField, NodeBounds};
pub use node::NodeId;
pub use stats::TreeStats;
pub use tree::Octree;

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
