//! Per-bucket state: an inner sub-queue plus DRR accounting.

use crate::inner_queue::InnerQueue;
use std::fmt;

/// Owns the inner sub-queue for one bucket, plus deficit/backlog
/// accounting and list-membership state.
pub struct Slot {
    pub h: usize,
    pub inner: Box<dyn InnerQueue>,
    pub deficit: i64,
    pub backlog: u64,
    pub active: bool,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("h", &self.h)
            .field("deficit", &self.deficit)
            .field("backlog", &self.backlog)
            .field("active", &self.active)
            .field("inner_size", &self.inner.size())
            .finish()
    }
}

impl Slot {
    pub fn new(h: usize, inner: Box<dyn InnerQueue>, quantum: u32) -> Self {
        Self {
            h,
            inner,
            deficit: quantum as i64,
            backlog: 0,
            active: false,
        }
    }
}
