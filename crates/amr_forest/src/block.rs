//! Block - the mesh actor.
//!
//! Every block of the forest, leaf or interior, is one actor addressed by its
//! [`ForestIndex`]. A block only touches its own state; everything it wants
//! from other blocks goes out through an [`Outbox`] as a [`Message`].
//!
//! # Face Tables
//!
//! A leaf keeps the level of the leaf (or leaves) across each face, edge and
//! corner in a table indexed by [`FaceOffset::slot`]. `None` marks the edge
//! of a non-periodic domain. By 2:1 balance each entry is `level - 1`,
//! `level` or `level + 1`.
//!
//! ```text
//!   COARSE (-1)      SAME (0)        FINE (+1)
//!  ┌───────┬───┐   ┌───┬───┐      ┌───┬─┬─┐
//!  │       │ S │   │ S │ n │      │   │ │ │
//!  │   n   ├───┤   └───┴───┘      │ S ├─┼─┤
//!  │       │   │                  │   │ │ │
//!  └───────┴───┘                  └───┴─┴─┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::config::ForestLayout;
use crate::constants::NUM_OFFSETS;
use crate::criterion::{InitialCondition, RefineCriterion};
use crate::faces::{ChildOffset, FaceOffset, FaceOffsets};
use crate::field::FieldBlock;
use crate::index::ForestIndex;
use crate::refresh::GhostBuffer;

/// Neighbor level per direction slot; `None` across a domain edge.
pub type FaceLevels = [Option<i32>; NUM_OFFSETS];

/// Relation between a block and its neighbor in one direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
  Coarse,
  Same,
  Fine,
}

impl Relation {
  /// Classify a neighbor level against the block's own.
  ///
  /// # Panics
  /// Panics on any jump other than -1, 0 or +1: the mesh is not balanced.
  pub fn classify(index: &ForestIndex, face: FaceOffset, neighbor_level: i32) -> Relation {
    match neighbor_level - index.level() {
      -1 => Relation::Coarse,
      0 => Relation::Same,
      1 => Relation::Fine,
      jump => panic!(
        "block {index} sees level {neighbor_level} toward {face}: jump {jump} breaks 2:1 balance"
      ),
    }
  }
}

/// A neighbor's current and intended level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelNotice {
  pub sender: ForestIndex,
  /// Direction from the receiver toward the sender.
  pub face: FaceOffset,
  pub level_now: i32,
  pub level_next: i32,
}

/// Restricted data and derived face table sent by a coarsening child.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildData {
  pub child: ChildOffset,
  pub payload: Vec<f64>,
  pub face_level: FaceLevels,
}

/// Everything a block can receive.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
  /// Evaluate the criterion and notify neighbors. `initial` disables
  /// coarsening and fills new children from the initial condition.
  BeginAdapt { initial: bool },
  NeighborLevel(LevelNotice),
  /// Act on the agreed level.
  CommitAdapt,
  ChildCoarsened(ChildData),
  BeginRefresh,
  Ghost(GhostBuffer),
}

/// Message category, used for counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
  BeginAdapt,
  NeighborLevel,
  CommitAdapt,
  ChildCoarsened,
  BeginRefresh,
  GhostCopy,
  GhostRestrict,
  GhostProlong,
}

impl MessageKind {
  pub const COUNT: usize = 8;

  #[inline]
  pub fn index(self) -> usize {
    self as usize
  }
}

impl Message {
  pub fn kind(&self) -> MessageKind {
    use crate::refresh::GhostOp;
    match self {
      Message::BeginAdapt { .. } => MessageKind::BeginAdapt,
      Message::NeighborLevel(_) => MessageKind::NeighborLevel,
      Message::CommitAdapt => MessageKind::CommitAdapt,
      Message::ChildCoarsened(_) => MessageKind::ChildCoarsened,
      Message::BeginRefresh => MessageKind::BeginRefresh,
      Message::Ghost(buffer) => match buffer.op {
        GhostOp::Copy => MessageKind::GhostCopy,
        GhostOp::Restrict => MessageKind::GhostRestrict,
        GhostOp::Prolong => MessageKind::GhostProlong,
      },
    }
  }
}

/// Effects a handler can have outside its own block.
pub trait Outbox {
  fn send(&mut self, to: ForestIndex, message: Message);

  /// Register a newly created block.
  fn spawn(&mut self, block: Block);

  /// Remove a block once its handler returns.
  fn retire(&mut self, index: ForestIndex);
}

/// Outbox that records effects for later application.
#[derive(Debug, Default)]
pub struct Effects {
  pub sends: Vec<(ForestIndex, Message)>,
  pub spawned: Vec<Block>,
  pub retired: Vec<ForestIndex>,
}

impl Effects {
  /// Messages addressed to `to`, in send order.
  pub fn sent_to(&self, to: &ForestIndex) -> impl Iterator<Item = &Message> {
    let to = *to;
    self.sends.iter().filter(move |(dest, _)| *dest == to).map(|(_, m)| m)
  }
}

impl Outbox for Effects {
  fn send(&mut self, to: ForestIndex, message: Message) {
    self.sends.push((to, message));
  }

  fn spawn(&mut self, block: Block) {
    self.spawned.push(block);
  }

  fn retire(&mut self, index: ForestIndex) {
    self.retired.push(index);
  }
}

/// Read-only state shared by every block handler.
pub struct BlockContext {
  pub layout: ForestLayout,
  pub criterion: Arc<dyn RefineCriterion>,
  pub initial: Option<Arc<dyn InitialCondition>>,
  /// Faces, edges and corners: the adaptation neighborhood.
  pub neighbors: FaceOffsets,
  /// Directions exchanged during refresh.
  pub ghosts: FaceOffsets,
  /// Every field, in storage order.
  pub fields: Vec<usize>,
}

impl BlockContext {
  pub fn new(
    layout: ForestLayout,
    criterion: Arc<dyn RefineCriterion>,
    initial: Option<Arc<dyn InitialCondition>>,
  ) -> Self {
    let neighbors = FaceOffsets::all(layout.rank);
    let ghosts = FaceOffsets::new(layout.rank, layout.refresh_min_face_rank);
    let fields = (0..layout.field_count).collect();
    Self {
      layout,
      criterion,
      initial,
      neighbors,
      ghosts,
      fields,
    }
  }

  #[inline]
  pub fn rank(&self) -> usize {
    self.layout.rank
  }

  /// Face table of a block with only its domain edges resolved: every
  /// in-domain direction holds the block's own level.
  pub fn uniform_face_levels(&self, index: &ForestIndex) -> FaceLevels {
    let mut table = [None; NUM_OFFSETS];
    for face in self.neighbors.iter() {
      if !self.is_boundary(index, face) {
        table[face.slot()] = Some(index.level());
      }
    }
    table
  }

  #[inline]
  pub fn is_boundary(&self, index: &ForestIndex, face: FaceOffset) -> bool {
    index.is_on_boundary(face, self.layout.root_blocks, self.layout.periodic)
  }

  #[inline]
  pub fn neighbor(&self, index: &ForestIndex, face: FaceOffset) -> ForestIndex {
    index.index_neighbor(face, self.layout.root_blocks)
  }

  /// Fresh storage filled from the initial condition, or zeros without one.
  pub fn initial_data(&self, index: &ForestIndex) -> FieldBlock {
    let layout = &self.layout;
    let mut data = FieldBlock::new(layout.block_size, layout.ghost, layout.field_count);
    if let Some(initial) = &self.initial {
      for field in 0..layout.field_count {
        data.fill_interior(field, |cell| initial.value(field, layout.cell_center(index, cell)));
      }
    }
    data
  }
}

/// Adaptation state of one cycle.
#[derive(Clone, Debug, Default)]
pub(crate) struct AdaptState {
  pub begun: bool,
  pub initial: bool,
  pub level_next: i32,
  /// Highest intended level heard from each sender.
  pub intents: HashMap<ForestIndex, i32>,
}

/// Coarsening children reported so far; survives the parent's own commit.
#[derive(Clone, Debug)]
pub(crate) struct MergeState {
  pub arrived: usize,
  pub face_level: FaceLevels,
}

impl Default for MergeState {
  fn default() -> Self {
    Self {
      arrived: 0,
      face_level: [None; NUM_OFFSETS],
    }
  }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RefreshState {
  pub begun: bool,
  pub expected: usize,
  pub received: usize,
  /// Completed refreshes since creation.
  pub completed: u64,
}

/// One mesh block: its address, field data, children and protocol state.
#[derive(Clone, Debug)]
pub struct Block {
  pub(crate) index: ForestIndex,
  pub(crate) data: FieldBlock,
  pub(crate) children: SmallVec<[ForestIndex; 8]>,
  pub(crate) face_level: FaceLevels,
  pub(crate) adapt: AdaptState,
  pub(crate) merge: MergeState,
  pub(crate) refresh: RefreshState,
}

impl Block {
  pub fn new(index: ForestIndex, data: FieldBlock, face_level: FaceLevels) -> Self {
    Self {
      index,
      data,
      children: SmallVec::new(),
      face_level,
      adapt: AdaptState::default(),
      merge: MergeState::default(),
      refresh: RefreshState::default(),
    }
  }

  #[inline]
  pub fn index(&self) -> &ForestIndex {
    &self.index
  }

  #[inline]
  pub fn level(&self) -> i32 {
    self.index.level()
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  pub fn children(&self) -> &[ForestIndex] {
    &self.children
  }

  pub fn data(&self) -> &FieldBlock {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut FieldBlock {
    &mut self.data
  }

  /// Level across `face`, `None` at a domain edge.
  #[inline]
  pub fn face_level(&self, face: FaceOffset) -> Option<i32> {
    self.face_level[face.slot()]
  }

  pub fn face_levels(&self) -> &FaceLevels {
    &self.face_level
  }

  /// Level this block intends to reach in the current cycle.
  #[inline]
  pub fn level_next(&self) -> i32 {
    self.adapt.level_next
  }

  /// Number of refreshes this block has completed.
  #[inline]
  pub fn refreshes_completed(&self) -> u64 {
    self.refresh.completed
  }

  /// Dispatch one message.
  pub fn handle(&mut self, message: Message, ctx: &BlockContext, out: &mut dyn Outbox) {
    match message {
      Message::BeginAdapt { initial } => self.begin_adapt(initial, ctx, out),
      Message::NeighborLevel(notice) => self.on_level_notice(notice, ctx, out),
      Message::CommitAdapt => self.commit_adapt(ctx, out),
      Message::ChildCoarsened(child) => self.on_child_coarsened(child, ctx),
      Message::BeginRefresh => self.begin_refresh(ctx, out),
      Message::Ghost(buffer) => self.on_ghost(buffer, ctx),
    }
  }
}
