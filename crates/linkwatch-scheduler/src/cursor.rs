//! Round-robin cursor over the endpoint list.
//!
//! The index lives in an `AtomicUsize` so status readers never wait on the
//! probe loop. Only the loop moves it.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Position of the scheduler within the endpoint list.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    index: AtomicUsize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp the index into `0..len` and return it.
    ///
    /// A list that shrank below the index restarts from the first endpoint.
    /// Returns 0 for an empty list.
    pub fn clamp(&self, len: usize) -> usize {
        let idx = self.index.load(Ordering::Relaxed);
        if idx < len {
            return idx;
        }
        self.index.store(0, Ordering::Relaxed);
        0
    }

    /// Move to the next endpoint. Returns `true` when the cursor wrapped
    /// from the last endpoint back to the first.
    pub fn advance(&self, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        let next = self.index.load(Ordering::Relaxed) + 1;
        if next >= len {
            self.index.store(0, Ordering::Relaxed);
            true
        } else {
            self.index.store(next, Ordering::Relaxed);
            false
        }
    }

    pub fn current(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.index.store(0, Ordering::Relaxed);
    }
}
