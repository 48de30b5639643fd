//! Task queue for the scheduler
//!
//! Multi-producer, multi-consumer queue of task records. Workers pop from
//! the front of their own queue; thieves pop from the back.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::task::Task;

/// A thread-safe task queue supporting multiple producers and consumers.
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Arc<Task>>>,
}

impl TaskQueue {
    /// Create a new empty task queue.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a task to the back of the queue.
    #[inline]
    pub fn push(
        &self,
        task: Arc<Task>,
    ) {
        self.inner.lock().push_back(task);
    }

    /// Push a task to the front of the queue.
    #[inline]
    pub fn push_front(
        &self,
        task: Arc<Task>,
    ) {
        self.inner.lock().push_front(task);
    }

    /// Pop a task from the front of the queue.
    #[inline]
    pub fn pop_front(&self) -> Option<Arc<Task>> {
        self.inner.lock().pop_front()
    }

    /// Pop a task from the back of the queue (for work stealing).
    #[inline]
    pub fn pop_back(&self) -> Option<Arc<Task>> {
        self.inner.lock().pop_back()
    }

    /// Get the number of tasks in the queue.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
