//! Work stealing for load balancing across worker threads.
//!
//! Idle workers steal queued tasks from busy workers' local queues so that
//! oversubscription on one worker cannot starve the rest of the pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use super::queue::TaskQueue;
use super::task::Task;

/// Statistics about work stealing operations.
#[derive(Debug, Default)]
pub struct StealStats {
    /// Number of successful steals.
    pub steal_successes: AtomicUsize,
    /// Number of failed steal attempts.
    pub steal_failures: AtomicUsize,
    /// Total tasks stolen.
    pub tasks_stolen: AtomicUsize,
}

impl StealStats {
    /// Record a successful steal of `count` tasks.
    #[inline]
    pub fn record_success(
        &self,
        count: usize,
    ) {
        self.steal_successes.fetch_add(1, Ordering::SeqCst);
        self.tasks_stolen.fetch_add(count, Ordering::SeqCst);
    }

    /// Record a failed steal attempt.
    #[inline]
    pub fn record_failure(&self) {
        self.steal_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Get the steal success rate.
    pub fn success_rate(&self) -> f64 {
        let successes = self.steal_successes.load(Ordering::SeqCst);
        let failures = self.steal_failures.load(Ordering::SeqCst);
        let total = successes + failures;
        if total == 0 {
            return 1.0;
        }
        successes as f64 / total as f64
    }
}

/// Strategy for stealing tasks from other workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StealStrategy {
    /// Steal from the back of victim's queue (reduces contention).
    #[default]
    Back,
    /// Steal from the front of victim's queue (FIFO).
    Front,
}

/// Work stealer over a fixed set of per-worker queues.
///
/// The queue set is sized at pool startup and never changes; spare workers
/// spawned by the blocking hook have no queue of their own and live off
/// stolen work alone.
#[derive(Debug)]
pub struct WorkStealer {
    /// One queue per regular worker.
    queues: Vec<Arc<TaskQueue>>,
    /// Stealing strategy.
    strategy: StealStrategy,
    /// Statistics.
    stats: StealStats,
}

impl WorkStealer {
    /// Create a new work stealer with one queue per worker.
    pub fn new(num_workers: usize) -> Self {
        let queues = (0..num_workers)
            .map(|_| Arc::new(TaskQueue::new()))
            .collect();

        Self {
            queues,
            strategy: StealStrategy::default(),
            stats: StealStats::default(),
        }
    }

    /// Get the number of queues.
    #[inline]
    pub fn num_queues(&self) -> usize {
        self.queues.len()
    }

    /// Push a task onto a specific worker's queue.
    #[inline]
    pub fn push_to(
        &self,
        worker_id: usize,
        task: Arc<Task>,
    ) {
        self.queues[worker_id % self.queues.len()].push(task);
    }

    /// Try to pop from a worker's own queue. Spare workers (ids beyond the
    /// queue set) have no local queue.
    #[inline]
    pub fn try_local(
        &self,
        worker_id: usize,
    ) -> Option<Arc<Task>> {
        self.queues.get(worker_id)?.pop_front()
    }

    /// Total queued tasks across all workers.
    pub fn queued(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Steal up to `max_count` tasks from other workers' queues.
    pub fn steal_batch(
        &self,
        worker_id: usize,
        max_count: usize,
    ) -> Vec<Arc<Task>> {
        let mut stolen = Vec::with_capacity(max_count);
        let num_queues = self.queues.len();

        if num_queues == 0 || max_count == 0 {
            return stolen;
        }

        // Start from a random victim, then sweep the rest in order so a
        // single busy queue is always found eventually.
        let start = rand::rng().random_range(0..num_queues);

        for step in 0..num_queues {
            let victim_id = (start + step) % num_queues;
            if victim_id == worker_id {
                continue;
            }

            while stolen.len() < max_count {
                match self.steal_from(victim_id) {
                    Some(task) => stolen.push(task),
                    None => break,
                }
            }

            if stolen.len() >= max_count {
                break;
            }
        }

        if stolen.is_empty() {
            self.stats.record_failure();
        } else {
            self.stats.record_success(stolen.len());
        }

        stolen
    }

    /// Steal from a specific victim's queue.
    fn steal_from(
        &self,
        victim_id: usize,
    ) -> Option<Arc<Task>> {
        let queue = self.queues.get(victim_id)?;
        match self.strategy {
            StealStrategy::Back => queue.pop_back(),
            StealStrategy::Front => queue.pop_front(),
        }
    }

    /// Get steal statistics.
    #[inline]
    pub fn stats(&self) -> &StealStats {
        &self.stats
    }
}
