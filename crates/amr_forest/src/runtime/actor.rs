//! ActorCell - one block's mailbox, lock and scheduling flag.
//!
//! The `scheduled` flag guarantees at most one drain job per cell, so the
//! block lock is never contended while the runtime is healthy. The lock is
//! still taken with `try_lock` first so a violation can be counted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::block::{Block, Message};
use crate::index::ForestIndex;

pub(crate) struct ActorCell {
  pub index: ForestIndex,
  mailbox: Sender<Message>,
  inbox: Receiver<Message>,
  scheduled: AtomicBool,
  retired: AtomicBool,
  pub block: Mutex<Block>,
}

impl ActorCell {
  pub fn new(block: Block) -> Self {
    let (mailbox, inbox) = channel::unbounded();
    Self {
      index: *block.index(),
      mailbox,
      inbox,
      scheduled: AtomicBool::new(false),
      retired: AtomicBool::new(false),
      block: Mutex::new(block),
    }
  }

  /// Queue a message. The cell owns both channel ends, so this cannot fail
  /// while the cell is alive.
  pub fn post(&self, message: Message) {
    if self.mailbox.send(message).is_err() {
      tracing::error!(index = %self.index, "mailbox disconnected");
    }
  }

  #[inline]
  pub fn next_message(&self) -> Option<Message> {
    self.inbox.try_recv().ok()
  }

  #[inline]
  pub fn has_mail(&self) -> bool {
    !self.inbox.is_empty()
  }

  /// Claim the right to run a drain job. Returns false if one is running.
  #[inline]
  pub fn try_schedule(&self) -> bool {
    !self.scheduled.swap(true, Ordering::AcqRel)
  }

  #[inline]
  pub fn unschedule(&self) {
    self.scheduled.store(false, Ordering::Release);
  }

  pub fn retire(&self) {
    self.retired.store(true, Ordering::Release);
  }

  #[inline]
  pub fn is_retired(&self) -> bool {
    self.retired.load(Ordering::Acquire)
  }
}
