//! Configuration errors.
//!
//! Only configuration faults are recoverable values. Topology faults (an
//! impossible face/level relation, an out-of-range selector) panic, since they
//! mean a protocol invariant is already broken.

use thiserror::Error;

/// Errors reported while validating configuration or starting the runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForestError {
  #[error("unsupported branching factor {0} (expected 2, 4, 8 or 16)")]
  InvalidBranching(usize),

  #[error("unsupported rank {0} (expected 1, 2 or 3)")]
  InvalidRank(usize),

  #[error("domain of {cells} cells on axis {axis} is not divisible into {blocks} root blocks")]
  IndivisibleDomain { axis: usize, cells: usize, blocks: usize },

  #[error("root block count {blocks} on axis {axis} exceeds the index limit {limit}")]
  TooManyRootBlocks { axis: usize, blocks: usize, limit: u32 },

  #[error("block size {size} on axis {axis} must be even and at least twice the ghost depth {ghost}")]
  InvalidBlockSize { axis: usize, size: usize, ghost: usize },

  #[error("max level {0} exceeds the index limit {1}")]
  LevelOutOfRange(i32, i32),

  #[error("domain lower corner must be below the upper corner on every active axis")]
  InvalidDomainBounds,

  #[error("at least one field is required")]
  NoFields,

  #[error("failed to build the actor thread pool: {0}")]
  ThreadPool(String),
}

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ForestError>;
