//! Cooperative blocking hook.
//!
//! A logical task that blocks (on a synchronization cell, an end-count, or
//! a transfer reply) must not strand the worker thread carrying it: with a
//! bounded pool, enough simultaneous blockers would deadlock the whole
//! program. Instead of continuations, blocking waits are wrapped in a
//! [`BlockingSection`]: entering one tells the pool this worker is about to
//! stop draining queues, and the pool spawns a spare worker if no unblocked
//! worker would remain. Spares retire on their own once the pool is back
//! over capacity.
//!
//! Threads that do not belong to a pool pass through unchanged, so the same
//! cell code works from the program main thread.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::PoolShared;

thread_local! {
    static WORKER: RefCell<Option<WorkerCx>> = const { RefCell::new(None) };
}

/// Identity of the pool worker running on the current thread.
pub(crate) struct WorkerCx {
    pub(crate) shared: Weak<PoolShared>,
    #[allow(dead_code)]
    pub(crate) worker_id: usize,
}

/// Bind the current thread to a pool worker. Called at worker startup.
pub(crate) fn register_worker(cx: WorkerCx) {
    WORKER.with(|w| *w.borrow_mut() = Some(cx));
}

/// Unbind the current thread from its pool. Called at worker exit.
pub(crate) fn clear_worker() {
    WORKER.with(|w| *w.borrow_mut() = None);
}

/// Pool of the current worker thread, if any.
pub(crate) fn current_pool() -> Option<Arc<PoolShared>> {
    WORKER.with(|w| w.borrow().as_ref().and_then(|cx| cx.shared.upgrade()))
}

/// RAII marker for a potentially-unbounded wait.
///
/// Enter before parking on a condvar or a reply channel; drop when the wait
/// is over. While a section is open the pool counts this worker as blocked
/// and keeps at least one unblocked worker alive.
#[must_use = "a blocking section marks the wait between its creation and drop"]
pub struct BlockingSection {
    pool: Option<Arc<PoolShared>>,
}

impl BlockingSection {
    /// Open a blocking section on the current thread.
    pub fn enter() -> Self {
        let pool = current_pool();
        if let Some(pool) = &pool {
            PoolShared::on_block(pool);
        }
        Self { pool }
    }
}

impl Drop for BlockingSection {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.on_unblock();
        }
    }
}

/// Run `f` inside a blocking section.
#[inline]
pub fn section<R>(f: impl FnOnce() -> R) -> R {
    let _section = BlockingSection::enter();
    f()
}
