//! Ghost-zone refresh.
//!
//! Every leaf fills its neighbors' ghost layers from its own interior. What
//! it sends depends on the level across each direction:
//!
//! | Relation | Sender does                               | Receiver stores into        |
//! |----------|-------------------------------------------|-----------------------------|
//! | SAME     | copy the slab toward the neighbor         | `ghost(-g)`                 |
//! | COARSE   | restrict a double-thick slab              | its octant of `ghost(-g)`   |
//! | FINE     | prolong into each finer block's ghost box | `ghost(f)` of that block    |
//!
//! A leaf knows from its own face table how many buffers it will receive,
//! so it can tell when its ghosts are complete without any global barrier;
//! it then fills domain-edge ghosts (outflow boundaries).

use crate::block::{Block, BlockContext, Message, Outbox, Relation};
use crate::config::BoundaryKind;
use crate::faces::{ChildOffset, FaceOffset};
use crate::field::{gather, scatter, storage_offset, CellBox, FieldAccess};
use crate::transfer::{prolong, restrict};

/// Level-transfer operation a buffer was produced with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GhostOp {
  Copy,
  Restrict,
  Prolong,
}

/// Self-describing ghost payload.
#[derive(Clone, Debug, PartialEq)]
pub struct GhostBuffer {
  pub op: GhostOp,
  /// Receiver's ghost direction.
  pub face: FaceOffset,
  /// Sender's position in its parent (restrict) or the receiver's (prolong).
  pub child: ChildOffset,
  pub fields: Vec<usize>,
  pub payload: Vec<f64>,
}

impl GhostBuffer {
  /// Receiver-side cells this buffer fills.
  pub fn region(&self, size: [usize; 3], ghost: [usize; 3], rank: usize) -> CellBox {
    let mut region = CellBox::ghost(size, ghost, self.face);
    if self.op == GhostOp::Restrict {
      for axis in 0..rank {
        if self.face.get(axis) == 0 {
          let half = (size[axis] / 2) as isize;
          region.low[axis] = self.child.get(axis) as isize * half;
          region.up[axis] = region.low[axis] + half;
        }
      }
    }
    region
  }
}

/// Buffers expected for the ghost region in direction `face`.
pub fn expected_buffers(relation: Relation, face: FaceOffset, rank: usize) -> usize {
  match relation {
    Relation::Same | Relation::Coarse => 1,
    Relation::Fine => 1 << (rank - face.crossings()),
  }
}

impl Block {
  /// Send ghost data to every neighbor and work out how much to expect.
  pub(crate) fn begin_refresh(&mut self, ctx: &BlockContext, out: &mut dyn Outbox) {
    if !self.is_leaf() {
      return;
    }
    let rank = ctx.rank();
    let size = ctx.layout.block_size;
    let ghost = ctx.layout.ghost;
    let mut expected = 0;

    for face in ctx.ghosts.iter() {
      let Some(neighbor_level) = self.face_level(face) else {
        continue;
      };
      let neighbor = ctx.neighbor(&self.index, face);
      let relation = Relation::classify(&self.index, face, neighbor_level);
      expected += expected_buffers(relation, face, rank);

      match relation {
        Relation::Same => {
          let payload = gather(&self.data, &ctx.fields, &CellBox::slab(size, face, ghost));
          let buffer = GhostBuffer {
            op: GhostOp::Copy,
            face: -face,
            child: ChildOffset::default(),
            fields: ctx.fields.clone(),
            payload,
          };
          out.send(neighbor, Message::Ghost(buffer));
        }
        Relation::Coarse => {
          let child = self.index.child_offset();
          if !face.exits_parent(child) {
            continue;
          }
          let thick = ghost.map(|g| 2 * g);
          let payload = restrict(&self.data, &ctx.fields, &CellBox::slab(size, face, thick), rank);
          let buffer = GhostBuffer {
            op: GhostOp::Restrict,
            face: -face,
            child,
            fields: ctx.fields.clone(),
            payload,
          };
          out.send(neighbor.index_parent(), Message::Ghost(buffer));
        }
        Relation::Fine => {
          for child in ChildOffset::adjacent_to(rank, -face) {
            // the finer block's origin in this block's doubled coordinates
            let origin = [0, 1, 2].map(|a| {
              let n = size[a] as isize;
              face.get(a) as isize * 2 * n + child.get(a) as isize * n
            });
            let target = neighbor.index_child(child);
            for their_face in ctx.ghosts.through_parent_face(child, -face) {
              let region = CellBox::ghost(size, ghost, their_face).translate(origin);
              let payload = prolong(&self.data, &ctx.fields, &region, rank);
              let buffer = GhostBuffer {
                op: GhostOp::Prolong,
                face: their_face,
                child,
                fields: ctx.fields.clone(),
                payload,
              };
              out.send(target, Message::Ghost(buffer));
            }
          }
        }
      }
    }

    self.refresh.expected = expected;
    self.refresh.begun = true;
    self.finish_refresh_if_complete(ctx);
  }

  /// Store one buffer; buffers may arrive before this block has begun.
  pub(crate) fn on_ghost(&mut self, buffer: GhostBuffer, ctx: &BlockContext) {
    let region = buffer.region(ctx.layout.block_size, ctx.layout.ghost, ctx.rank());
    scatter(&mut self.data, &buffer.fields, &region, &buffer.payload);
    self.refresh.received += 1;
    self.finish_refresh_if_complete(ctx);
  }

  fn finish_refresh_if_complete(&mut self, ctx: &BlockContext) {
    let state = &mut self.refresh;
    if !state.begun || state.received < state.expected {
      return;
    }
    debug_assert_eq!(
      state.received, state.expected,
      "block {} received more ghost buffers than expected",
      self.index
    );
    state.begun = false;
    state.received = 0;
    state.expected = 0;
    state.completed += 1;

    if ctx.layout.boundary == BoundaryKind::Outflow {
      self.apply_outflow(ctx);
    }
  }

  /// Zero-gradient ghosts across domain edges. Faces go first so edges and
  /// corners can copy from ghosts that are already valid.
  fn apply_outflow(&mut self, ctx: &BlockContext) {
    let size = ctx.layout.block_size;
    let ghost = ctx.layout.ghost;
    let mut faces: Vec<FaceOffset> = ctx
      .ghosts
      .iter()
      .filter(|face| self.face_level(*face).is_none())
      .collect();
    faces.sort_by_key(|face| face.crossings());

    for face in faces {
      let clamp_axes: Vec<usize> = (0..ctx.rank())
        .filter(|&axis| {
          let step = face.get(axis);
          let mut single = [0i8; 3];
          single[axis] = step;
          step != 0 && ctx.is_boundary(&self.index, FaceOffset(single))
        })
        .collect();
      let region = CellBox::ghost(size, ghost, face);
      for field in 0..self.data.field_count() {
        let values = self.data.values_mut(field);
        for cell in region.cells() {
          let mut source = cell;
          for &axis in &clamp_axes {
            source[axis] = source[axis].clamp(0, size[axis] as isize - 1);
          }
          values[storage_offset(size, ghost, cell)] = values[storage_offset(size, ghost, source)];
        }
      }
    }
  }
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod refresh_test;
