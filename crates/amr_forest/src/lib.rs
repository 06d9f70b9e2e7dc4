//! amr_forest - Forest-of-octrees adaptive mesh refinement
//!
//! This crate provides the mesh backbone of a block-structured AMR
//! simulation: an array of root blocks, each the root of a tree that refines
//! by two per axis, kept 2:1 balanced across faces, edges and corners.
//!
//! # Features
//!
//! - **Forest Index**: fixed-width addressing of any block by array position,
//!   tree path and level, with pure parent/child/neighbor stepping
//! - **Octree Engine**: arena-backed k^d-ary tree with level-field refinement,
//!   2:1 balancing and coalescing
//! - **Actor Adaptation**: every block is an actor; blocks agree on a
//!   balanced refinement through neighbor notices and quiescence
//! - **Ghost Refresh**: copy, restrict and prolong across level jumps, with
//!   periodic or outflow domain edges
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use amr_forest::{Forest, ForestConfig, ValueThreshold};
//!
//! let config = ForestConfig::default();
//! let criterion = ValueThreshold { field: 0, refine_above: 0.5, coarsen_below: 0.1 };
//! let mut forest = Forest::new(&config, Arc::new(criterion), None)?;
//!
//! forest.build_initial_mesh();
//! for _ in 0..10 {
//!     forest.update_leaves(|leaf, data| { /* solver step */ });
//!     forest.adapt();
//!     forest.refresh();
//!     forest.advance(0.01);
//! }
//! ```

pub mod bounds;
pub mod constants;
pub mod error;
pub mod faces;
pub mod index;

pub use bounds::DAabb3;
pub use error::{ForestError, Result};
pub use faces::{ChildOffset, Face, FaceOffset, FaceOffsets};
pub use index::ForestIndex;

// Generic k^d-ary tree engine
pub mod octree;
pub use octree::{LevelField, NodeId, Octree, RefinePolicy, TreeConfig};

// Field storage and level transfer
pub mod field;
pub mod transfer;
pub use field::{CellBox, FieldAccess, FieldBlock};

// Configuration and criteria
pub mod config;
pub mod criterion;
pub use config::{BoundaryKind, ForestConfig, ForestLayout};
pub use criterion::{Adapt, BlockView, CriterionSet, InitialCondition, RefineCriterion, Slope, ValueThreshold};

// Mesh actors and their protocols
mod adapt;
pub mod block;
pub mod refresh;
pub use block::{Block, BlockContext, FaceLevels, Message, MessageKind, Relation};
pub use refresh::{GhostBuffer, GhostOp};

// Actor runtime
pub mod runtime;
pub use runtime::{CounterSnapshot, Runtime};

// Driver
pub mod forest;
pub mod metrics;
pub mod pipeline;
pub mod stats;
pub use forest::{FaceLevelMismatch, Forest, LeafInfo};
pub use metrics::ForestMetrics;
pub use pipeline::{AsyncCycle, CycleResult};
pub use stats::{AdaptStats, RefreshStats};
