//! End-count join scopes.
//!
//! An end-count tracks the outstanding children of a task group: the
//! spawning thread enters once per spawned task (before the task can
//! possibly run), the executing side leaves once per completion, and
//! waiters block until the count drains to zero.
//!
//! The count is non-negative by invariant; a `leave` without a matching
//! `enter` is an internal fault and aborts the process.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::runtime::scheduler::blocking::BlockingSection;

/// Counter of outstanding child tasks in one join scope.
///
/// `enter` must strictly precede the matching `leave`: register the child
/// before making it runnable, never after, or a racing completion could
/// drain the scope prematurely.
#[derive(Debug, Default)]
pub struct EndCount {
    pending: Mutex<usize>,
    done: Condvar,
}

impl EndCount {
    /// Create a scope with no outstanding children.
    #[inline]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register one child about to be spawned.
    #[inline]
    pub fn enter(&self) {
        self.enter_many(1);
    }

    /// Register `n` children about to be spawned.
    pub fn enter_many(
        &self,
        n: usize,
    ) {
        *self.pending.lock() += n;
    }

    /// Record one child completion; wakes waiters if the scope drained.
    #[inline]
    pub fn leave(&self) {
        self.leave_many(1);
    }

    /// Record `n` child completions at once.
    pub fn leave_many(
        &self,
        n: usize,
    ) {
        if n == 0 {
            return;
        }
        let mut pending = self.pending.lock();
        if *pending < n {
            error!(pending = *pending, leaving = n, "end-count underflow");
            panic!("end-count underflow: leave without matching enter");
        }
        *pending -= n;
        if *pending == 0 {
            drop(pending);
            self.done.notify_all();
        }
    }

    /// Number of outstanding children at this instant.
    #[inline]
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Block until every entered child has left.
    ///
    /// Reusing the scope for further enter/leave pairs is allowed once the
    /// wait has returned, but not while another thread is still waiting.
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        if *pending > 0 {
            let _section = BlockingSection::enter();
            while *pending > 0 {
                self.done.wait(&mut pending);
            }
        }
    }

}

/// Locally aggregated completions, flushed to a parent [`EndCount`] in one
/// step. Flushes any remainder on drop.
///
/// Batched `leave`s accumulate in the holder and reach the parent as one
/// `leave_many` — one update instead of one per completion. A pool on a
/// non-origin locale can hold a batch against an origin-side scope and pay
/// a single cross-locale completion message for a group of tasks.
#[derive(Debug)]
pub struct CountBatch {
    parent: Arc<EndCount>,
    local: usize,
}

impl CountBatch {
    /// Open an empty batch against `parent`.
    pub fn new(parent: &Arc<EndCount>) -> Self {
        Self {
            parent: Arc::clone(parent),
            local: 0,
        }
    }

    /// Record one completion into the batch.
    #[inline]
    pub fn leave(&mut self) {
        self.local += 1;
    }

    /// Completions accumulated and not yet flushed.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.local
    }

    /// Flush accumulated completions to the parent scope.
    pub fn flush(&mut self) {
        let n = std::mem::take(&mut self.local);
        self.parent.leave_many(n);
    }
}

impl Drop for CountBatch {
    fn drop(&mut self) {
        self.flush();
    }
}
