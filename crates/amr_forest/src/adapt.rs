//! Adaptation protocol handlers.
//!
//! Each leaf picks an intended level from the criterion, tells every
//! neighbor, and raises its intent whenever a neighbor's intent would leave
//! the two more than one level apart. Intents only ever go up, so the
//! exchange settles; the driver detects that by quiescence and then sends
//! [`Message::CommitAdapt`].
//!
//! ```text
//! BeginAdapt ─► intent ─► notify ─┐
//!                  ▲              │ NeighborLevel
//!                  └── raise ◄────┘
//!          (quiescent) CommitAdapt ─► refine | coarsen | keep
//! ```
//!
//! A leaf may only coarsen when all its siblings coarsen too: a sibling that
//! intends to stay, or any nephew (a sibling's child) speaking up, vetoes it.

use std::collections::hash_map::Entry;

use crate::block::{Block, BlockContext, ChildData, LevelNotice, Message, Outbox, Relation};
use crate::constants::{INDEX_MAX_LEVEL, NUM_OFFSETS};
use crate::criterion::BlockView;
use crate::faces::{ChildOffset, FaceOffset};
use crate::field::{scatter, CellBox, FieldBlock};
use crate::index::ForestIndex;
use crate::transfer::{prolong, restrict};

impl Block {
  /// Pick the initial intent and notify every neighbor.
  pub(crate) fn begin_adapt(&mut self, initial: bool, ctx: &BlockContext, out: &mut dyn Outbox) {
    if !self.is_leaf() {
      return;
    }
    let level = self.level();
    let view = BlockView {
      index: &self.index,
      level,
      bounds: ctx.layout.block_bounds(&self.index),
      data: &self.data,
    };
    let vote = ctx.criterion.evaluate(&view);

    let mut next = level + vote.delta();
    if initial || level == 0 {
      next = next.max(level);
    }
    self.adapt.level_next = next.min(ctx.layout.max_level).max(0);
    self.adapt.begun = true;
    self.adapt.initial = initial;

    // notices that arrived before this block began
    let early: Vec<(ForestIndex, i32)> = self.adapt.intents.iter().map(|(s, l)| (*s, *l)).collect();
    for (sender, level_next) in early {
      self.constrain(&sender, level_next);
    }

    tracing::trace!(index = %self.index, level, next = self.adapt.level_next, "adapt intent");
    self.notify_neighbors(ctx, out);
  }

  /// Record a neighbor's intent and re-notify if ours had to rise.
  pub(crate) fn on_level_notice(&mut self, notice: LevelNotice, ctx: &BlockContext, out: &mut dyn Outbox) {
    if !self.is_leaf() {
      // the sender addressed a block that has since been refined
      for child in ChildOffset::adjacent_to(ctx.rank(), notice.face) {
        out.send(self.index.index_child(child), Message::NeighborLevel(notice));
      }
      return;
    }

    match self.adapt.intents.entry(notice.sender) {
      Entry::Occupied(mut entry) => {
        if *entry.get() >= notice.level_next {
          return;
        }
        entry.insert(notice.level_next);
      }
      Entry::Vacant(entry) => {
        entry.insert(notice.level_next);
      }
    }

    if self.adapt.begun && self.constrain(&notice.sender, notice.level_next) {
      tracing::trace!(
        index = %self.index,
        sender = %notice.sender,
        next = self.adapt.level_next,
        "intent raised"
      );
      self.notify_neighbors(ctx, out);
    }
  }

  /// Apply one neighbor intent to ours. Returns whether ours changed.
  fn constrain(&mut self, sender: &ForestIndex, sender_next: i32) -> bool {
    let level = self.level();
    let before = self.adapt.level_next;
    let mut next = before.max(sender_next - 1);
    if next < level {
      let sibling_stays = sender.is_sibling(&self.index) && sender_next >= level;
      if sibling_stays || sender.is_nephew_of(&self.index) {
        next = level;
      }
    }
    self.adapt.level_next = next;
    next != before
  }

  /// Send the current intent to every leaf across a face, edge or corner.
  fn notify_neighbors(&self, ctx: &BlockContext, out: &mut dyn Outbox) {
    let level = self.level();
    for face in ctx.neighbors.iter() {
      let Some(neighbor_level) = self.face_level(face) else {
        continue;
      };
      let neighbor = ctx.neighbor(&self.index, face);
      let notice = LevelNotice {
        sender: self.index,
        face: -face,
        level_now: level,
        level_next: self.adapt.level_next,
      };
      match Relation::classify(&self.index, face, neighbor_level) {
        Relation::Same => out.send(neighbor, Message::NeighborLevel(notice)),
        Relation::Coarse => {
          // one notice per coarse neighbor, through the direction that
          // leaves the parent whole
          if face.exits_parent(self.index.child_offset()) {
            out.send(neighbor.index_parent(), Message::NeighborLevel(notice));
          }
        }
        Relation::Fine => {
          for child in ChildOffset::adjacent_to(ctx.rank(), -face) {
            out.send(neighbor.index_child(child), Message::NeighborLevel(notice));
          }
        }
      }
    }
  }

  /// Act on the agreed intent.
  pub(crate) fn commit_adapt(&mut self, ctx: &BlockContext, out: &mut dyn Outbox) {
    if !self.is_leaf() || !self.adapt.begun {
      self.adapt = Default::default();
      return;
    }
    let level = self.level();
    let next = self.adapt.level_next;
    if next > level {
      self.refine_block(ctx, out);
    } else if next < level {
      self.coarsen_block(ctx, out);
    } else {
      self.face_level = self.final_face_levels(ctx);
    }
    self.adapt = Default::default();
  }

  /// Level of the leaf that will cover (or sit just inside) `location`
  /// once every pending intent is applied. `toward_me` points from the
  /// location back at this block.
  fn final_level_at(&self, location: &ForestIndex, toward_me: FaceOffset, rank: usize) -> Option<i32> {
    let intents = &self.adapt.intents;
    if let Some(&level) = intents.get(location) {
      return Some(level);
    }
    if location.level() < INDEX_MAX_LEVEL {
      let finer = ChildOffset::adjacent_to(rank, toward_me)
        .iter()
        .filter_map(|child| intents.get(&location.index_child(*child)))
        .max()
        .copied();
      if finer.is_some() {
        return finer;
      }
    }
    let mut ancestor = location.parent();
    while let Some(index) = ancestor {
      if let Some(&level) = intents.get(&index) {
        return Some(level);
      }
      ancestor = index.parent();
    }
    None
  }

  fn resolved_level(&self, from: &ForestIndex, face: FaceOffset, ctx: &BlockContext) -> i32 {
    let location = ctx.neighbor(from, face);
    self
      .final_level_at(&location, -face, ctx.rank())
      .unwrap_or_else(|| {
        panic!(
          "block {} has no intent for {location} toward {face} at commit",
          self.index
        )
      })
  }

  /// Face table this block will have after the commit, at its current level.
  fn final_face_levels(&self, ctx: &BlockContext) -> [Option<i32>; NUM_OFFSETS] {
    let mut table = [None; NUM_OFFSETS];
    for face in ctx.neighbors.iter() {
      if self.face_level(face).is_some() {
        table[face.slot()] = Some(self.resolved_level(&self.index, face, ctx));
      }
    }
    table
  }

  /// Create all children, seeded with prolonged (or initial) data.
  fn refine_block(&mut self, ctx: &BlockContext, out: &mut dyn Outbox) {
    let rank = ctx.rank();
    let level = self.level();
    let size = ctx.layout.block_size;
    for child in ChildOffset::all(rank) {
      let index = self.index.index_child(child);

      let mut table = [None; NUM_OFFSETS];
      for face in ctx.neighbors.iter() {
        if ctx.is_boundary(&index, face) {
          continue;
        }
        let neighbor_level = if face.parent_face(child).is_zero() {
          level + 1
        } else {
          self.resolved_level(&index, face, ctx)
        };
        table[face.slot()] = Some(neighbor_level);
      }

      let data = if self.adapt.initial && ctx.initial.is_some() {
        ctx.initial_data(&index)
      } else {
        let fine = CellBox::new(
          [0, 1, 2].map(|a| if a < rank { (child.get(a) as usize * size[a]) as isize } else { 0 }),
          [0, 1, 2].map(|a| {
            if a < rank {
              ((child.get(a) as usize + 1) * size[a]) as isize
            } else {
              size[a] as isize
            }
          }),
        );
        let payload = prolong(&self.data, &ctx.fields, &fine, rank);
        let mut data = FieldBlock::new(size, ctx.layout.ghost, ctx.layout.field_count);
        scatter(&mut data, &ctx.fields, &CellBox::interior(size), &payload);
        data
      };

      out.spawn(Block::new(index, data, table));
      self.children.push(index);
    }
    tracing::trace!(index = %self.index, children = self.children.len(), "refined");
  }

  /// Send restricted data and the derived face table up, then leave.
  fn coarsen_block(&mut self, ctx: &BlockContext, out: &mut dyn Outbox) {
    let rank = ctx.rank();
    let face_level = self.final_face_levels(ctx);
    let payload = restrict(&self.data, &ctx.fields, &CellBox::interior(ctx.layout.block_size), rank);
    let child = ChildData {
      child: self.index.child_offset(),
      payload,
      face_level,
    };
    out.send(self.index.index_parent(), Message::ChildCoarsened(child));
    out.retire(self.index);
  }

  /// Store one coarsening child's data; the last arrival makes this a leaf.
  pub(crate) fn on_child_coarsened(&mut self, data: ChildData, ctx: &BlockContext) {
    let rank = ctx.rank();
    let size = ctx.layout.block_size;
    let octant = CellBox::new(
      [0, 1, 2].map(|a| if a < rank { (data.child.get(a) as usize * size[a] / 2) as isize } else { 0 }),
      [0, 1, 2].map(|a| {
        if a < rank {
          ((data.child.get(a) as usize + 1) * size[a] / 2) as isize
        } else {
          size[a] as isize
        }
      }),
    );
    scatter(&mut self.data, &ctx.fields, &octant, &data.payload);

    for face in ctx.neighbors.iter() {
      if face.exits_parent(data.child) {
        let slot = face.slot();
        self.merge.face_level[slot] = self.merge.face_level[slot].max(data.face_level[slot]);
      }
    }

    self.merge.arrived += 1;
    if self.merge.arrived == 1 << rank {
      self.children.clear();
      self.face_level = std::mem::take(&mut self.merge).face_level;
      tracing::trace!(index = %self.index, "coarsened");
    }
  }
}

#[cfg(test)]
#[path = "adapt_test.rs"]
mod adapt_test;
