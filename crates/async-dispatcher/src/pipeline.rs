//! Pipeline - FIFO queue of postponed actions
//!
//! Holds the work a dispatcher could not start right away. Each entry is a
//! thunk: a zero-argument closure producing the future that runs one action.
//! The pipeline never runs thunks itself; the dispatcher pops them one at a
//! time and awaits each to completion.
//!
//! Not synchronized. The dispatcher owns it behind its state lock.

use crate::action::BoxFuture;
use std::collections::VecDeque;

/// A deferred unit of work waiting in the pipeline
pub type Thunk = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
pub struct Pipeline {
    steps: VecDeque<Thunk>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a thunk to the end of the pipeline - O(1)
    pub fn postpone(&mut self, thunk: Thunk) {
        self.steps.push_back(thunk);
    }

    /// Take the oldest thunk (FIFO) - O(1)
    pub fn pop_first(&mut self) -> Option<Thunk> {
        self.steps.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Drop every pending thunk without running it
    ///
    /// Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.steps.len();
        self.steps.clear();
        discarded
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("len", &self.steps.len())
            .finish()
    }
}
