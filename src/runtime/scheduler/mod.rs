//! Task pool and scheduler
//!
//! Maps an unbounded stream of logical tasks onto a bounded set of worker
//! threads. Each worker owns a local queue and steals from the others when
//! idle; tasks blocked on a synchronization primitive release their worker
//! through the blocking hook so ready tasks keep running.

pub mod blocking;
pub mod endcount;
pub mod queue;
pub mod task;
pub mod work_stealer;

pub use blocking::BlockingSection;
pub use endcount::{CountBatch, EndCount};
pub use queue::TaskQueue;
pub use task::{Task, TaskBuilder, TaskEntry, TaskId, TaskIdGenerator, TaskState};
pub use work_stealer::{StealStats, StealStrategy, WorkStealer};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::runtime::locale::{self, LocaleId};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of regular worker threads.
    pub num_workers: usize,
    /// Work stealing batch size.
    pub steal_batch: usize,
    /// Idle timeout before a parked worker re-checks the queues.
    pub idle_timeout: Duration,
    /// Locale the workers execute on behalf of, if the pool belongs to a
    /// runtime.
    pub locale: Option<LocaleId>,
    /// Locale count of the owning runtime.
    pub num_locales: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let num_cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            num_workers: num_cpus,
            steal_batch: 4,
            idle_timeout: Duration::from_millis(1),
            locale: None,
            num_locales: 1,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Total tasks scheduled.
    pub tasks_scheduled: AtomicUsize,
    /// Total tasks completed.
    pub tasks_completed: AtomicUsize,
    /// Total tasks that panicked.
    pub tasks_panicked: AtomicUsize,
    /// Total execution time in microseconds.
    pub total_exec_time_us: AtomicUsize,
    /// Spare workers spawned by the blocking hook.
    pub spares_spawned: AtomicUsize,
}

impl SchedulerStats {
    /// Record a scheduled task.
    #[inline]
    pub fn record_scheduled(&self) {
        self.tasks_scheduled.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a completed task.
    #[inline]
    pub fn record_completed(
        &self,
        duration_us: usize,
    ) {
        self.tasks_completed.fetch_add(1, Ordering::SeqCst);
        self.total_exec_time_us
            .fetch_add(duration_us, Ordering::SeqCst);
    }

    /// Record a panicking task.
    #[inline]
    pub fn record_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a spare worker spawn.
    #[inline]
    pub fn record_spare(&self) {
        self.spares_spawned.fetch_add(1, Ordering::SeqCst);
    }
}

/// State shared between the pool handle, its workers, and the blocking hook.
#[derive(Debug)]
pub(crate) struct PoolShared {
    /// Configuration.
    config: PoolConfig,
    /// Queues and stealing.
    stealer: WorkStealer,
    /// Running state.
    running: AtomicBool,
    /// Parked-worker wakeup.
    idle_mx: Mutex<()>,
    idle_cv: Condvar,
    /// Workers currently alive (regular + spare).
    live_workers: AtomicUsize,
    /// Workers currently inside a blocking section.
    blocked: AtomicUsize,
    /// Round-robin spawn cursor.
    next_spawn: AtomicUsize,
    /// Id source for spare workers.
    next_spare: AtomicUsize,
    /// Join handles of spare workers.
    spare_handles: Mutex<Vec<thread::JoinHandle<()>>>,
    /// Statistics.
    stats: SchedulerStats,
}

impl PoolShared {
    /// A worker is about to park on an unbounded wait. Keep at least one
    /// unblocked worker alive so ready tasks continue to run.
    pub(crate) fn on_block(shared: &Arc<Self>) {
        shared.blocked.fetch_add(1, Ordering::SeqCst);
        if !shared.running.load(Ordering::SeqCst) {
            return;
        }
        let live = shared.live_workers.load(Ordering::SeqCst);
        let blocked = shared.blocked.load(Ordering::SeqCst);
        if live <= blocked {
            Self::spawn_spare(shared);
        }
    }

    /// A worker finished its blocking wait.
    pub(crate) fn on_unblock(&self) {
        self.blocked.fetch_sub(1, Ordering::SeqCst);
    }

    /// More unblocked workers than the configured size: a spare may retire.
    fn surplus_capacity(&self) -> bool {
        let live = self.live_workers.load(Ordering::SeqCst);
        let blocked = self.blocked.load(Ordering::SeqCst);
        live.saturating_sub(blocked) > self.config.num_workers
    }

    fn spawn_spare(shared: &Arc<Self>) {
        let id = shared.config.num_workers + shared.next_spare.fetch_add(1, Ordering::SeqCst);
        shared.live_workers.fetch_add(1, Ordering::SeqCst);
        shared.stats.record_spare();
        debug!(worker = id, "spawning spare worker");

        let cloned = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("weft-worker-{}", id))
            .spawn(move || worker_loop(cloned, id, true))
            .expect("failed to spawn spare worker thread");

        shared.spare_handles.lock().push(handle);
    }

    fn wake_one(&self) {
        self.idle_cv.notify_one();
    }

    fn wake_all(&self) {
        self.idle_cv.notify_all();
    }
}

/// Worker thread main loop: local queue, then stealing, then park.
fn worker_loop(
    shared: Arc<PoolShared>,
    worker_id: usize,
    is_spare: bool,
) {
    if let Some(locale) = shared.config.locale {
        locale::adopt(locale, shared.config.num_locales);
    }
    blocking::register_worker(blocking::WorkerCx {
        shared: Arc::downgrade(&shared),
        worker_id,
    });

    while shared.running.load(Ordering::SeqCst) {
        if let Some(task) = shared.stealer.try_local(worker_id) {
            execute_task(&shared, task);
            continue;
        }

        let stolen = shared
            .stealer
            .steal_batch(worker_id, shared.config.steal_batch);
        if !stolen.is_empty() {
            for task in stolen {
                execute_task(&shared, task);
            }
            continue;
        }

        // Nothing runnable. Spares retire once regular capacity is back.
        if is_spare && shared.surplus_capacity() {
            break;
        }

        let mut guard = shared.idle_mx.lock();
        shared
            .idle_cv
            .wait_for(&mut guard, shared.config.idle_timeout);
    }

    blocking::clear_worker();
    shared.live_workers.fetch_sub(1, Ordering::SeqCst);
}

/// Run one task to completion. Panics inside user code are caught and
/// reported; the end-count is left either way.
fn execute_task(
    shared: &Arc<PoolShared>,
    task: Arc<Task>,
) {
    task.set_state(TaskState::Running);
    let start = Instant::now();

    let outcome = match task.take_entry() {
        Some(entry) => catch_unwind(AssertUnwindSafe(entry)),
        None => Ok(()),
    };

    let duration_us = start.elapsed().as_micros() as usize;
    match outcome {
        Ok(()) => task.set_state(TaskState::Finished),
        Err(payload) => {
            task.set_state(TaskState::Failed);
            shared.stats.record_panicked();
            error!(
                task = %task.id(),
                "task panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
    shared.stats.record_completed(duration_us);

    if let Some(end) = task.end_count() {
        end.leave();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<opaque panic payload>"
    }
}

/// Pool of worker threads executing task records.
///
/// Spawning never blocks the spawning thread; excess tasks queue until a
/// worker frees up. Nested spawns are unrestricted — a running task may
/// spawn into the same or a different scope at any depth.
#[derive(Debug)]
pub struct TaskPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    task_ids: TaskIdGenerator,
}

impl TaskPool {
    /// Create a pool with default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with custom configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        let num_workers = config.num_workers;
        let shared = Arc::new(PoolShared {
            stealer: WorkStealer::new(num_workers),
            running: AtomicBool::new(true),
            idle_mx: Mutex::new(()),
            idle_cv: Condvar::new(),
            live_workers: AtomicUsize::new(0),
            blocked: AtomicUsize::new(0),
            next_spawn: AtomicUsize::new(0),
            next_spare: AtomicUsize::new(0),
            spare_handles: Mutex::new(Vec::new()),
            stats: SchedulerStats::default(),
            config,
        });

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            shared.live_workers.fetch_add(1, Ordering::SeqCst);
            let shared = Arc::clone(&shared);
            let worker = thread::Builder::new()
                .name(format!("weft-worker-{}", worker_id))
                .spawn(move || worker_loop(shared, worker_id, false))
                .expect("failed to spawn worker thread");
            workers.push(worker);
        }

        Self {
            shared,
            workers: Mutex::new(workers),
            task_ids: TaskIdGenerator::new(),
        }
    }

    /// Submit a prepared task record.
    pub fn spawn(
        &self,
        task: Arc<Task>,
    ) {
        self.shared.stats.record_scheduled();
        let slot = self.shared.next_spawn.fetch_add(1, Ordering::SeqCst);
        self.shared.stealer.push_to(slot, task);
        self.shared.wake_one();
    }

    /// Spawn a closure into a join scope.
    ///
    /// The scope is entered *before* the task becomes runnable, so a racing
    /// completion can never drain the scope early; the worker leaves the
    /// scope when the closure finishes (or panics).
    pub fn spawn_into<F>(
        &self,
        end: &Arc<EndCount>,
        f: F,
    ) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        end.enter();
        let id = self.task_ids.next_id();
        let locale = self.shared.config.locale.unwrap_or_default();
        let task = Task::new(id, locale, Some(Arc::clone(end)), f);
        self.spawn(Arc::new(task));
        id
    }

    /// Spawn a closure with no join scope.
    pub fn spawn_detached<F>(
        &self,
        f: F,
    ) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.task_ids.next_id();
        let locale = self.shared.config.locale.unwrap_or_default();
        let task = Task::new(id, locale, None, f);
        self.spawn(Arc::new(task));
        id
    }

    /// Get the number of regular workers.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.shared.config.num_workers
    }

    /// Tasks queued and not yet picked up.
    #[inline]
    pub fn queued(&self) -> usize {
        self.shared.stealer.queued()
    }

    /// Check if the pool is running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.shared.stats
    }

    /// Get steal statistics.
    #[inline]
    pub fn steal_stats(&self) -> &StealStats {
        self.shared.stealer.stats()
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Tasks still queued are abandoned; callers that need them to finish
    /// wait on their join scope first.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.wake_all();

        for worker in self.workers.lock().drain(..) {
            worker.join().expect("worker thread panicked");
        }
        for spare in self.shared.spare_handles.lock().drain(..) {
            spare.join().expect("spare worker thread panicked");
        }
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests;
