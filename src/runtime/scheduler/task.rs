//! Task records for the scheduler.
//!
//! A task is an opaque unit of work: an entry closure, a target locale, and
//! the end-count it must decrement on completion. The scheduler owns the
//! record from spawn until completion.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::locale::LocaleId;
use crate::runtime::scheduler::endcount::EndCount;

/// Entry closure of a task.
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, waiting for a worker.
    Ready,
    /// Entry closure is executing.
    Running,
    /// Entry closure returned normally.
    Finished,
    /// Entry closure panicked.
    Failed,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => TaskState::Ready,
            1 => TaskState::Running,
            2 => TaskState::Finished,
            3 => TaskState::Failed,
            _ => TaskState::Ready,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Ready => 0,
            TaskState::Running => 1,
            TaskState::Finished => 2,
            TaskState::Failed => 3,
        }
    }
}

/// A schedulable unit of work.
pub struct Task {
    /// Unique task ID.
    id: TaskId,
    /// Task name for debugging.
    name: String,
    /// Current state (atomic for thread-safe access).
    state: AtomicU8,
    /// Locale the task was spawned onto.
    locale: LocaleId,
    /// The actual work to execute. Taken exactly once by the worker.
    entry: Mutex<Option<TaskEntry>>,
    /// Join scope to leave on completion. `None` when completion is routed
    /// elsewhere (remote tasks report back through the comm layer instead).
    end: Option<Arc<EndCount>>,
}

impl std::fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("locale", &self.locale)
            .finish()
    }
}

impl Task {
    /// Create a new task with the given ID and entry closure.
    pub fn new<F>(
        id: TaskId,
        locale: LocaleId,
        end: Option<Arc<EndCount>>,
        entry: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            name: format!("Task({})", id.inner()),
            state: AtomicU8::new(TaskState::Ready.as_u8()),
            locale,
            entry: Mutex::new(Some(Box::new(entry))),
            end,
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Set the task state.
    #[inline]
    pub fn set_state(
        &self,
        state: TaskState,
    ) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Locale the task targets.
    #[inline]
    pub fn locale(&self) -> LocaleId {
        self.locale
    }

    /// Join scope the task leaves on completion, if tracked locally.
    #[inline]
    pub fn end_count(&self) -> Option<&Arc<EndCount>> {
        self.end.as_ref()
    }

    /// Check if the task is finished (normally or by panic).
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self.state(), TaskState::Finished | TaskState::Failed)
    }

    /// Take the entry closure from the task.
    #[inline]
    pub fn take_entry(&self) -> Option<TaskEntry> {
        self.entry.lock().take()
    }
}

/// Builder for tasks with optional name and join scope.
#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    locale: LocaleId,
    end: Option<Arc<EndCount>>,
}

impl TaskBuilder {
    /// Create a new task builder targeting locale 0.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name.
    #[inline]
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the target locale.
    #[inline]
    pub fn locale(
        mut self,
        locale: LocaleId,
    ) -> Self {
        self.locale = locale;
        self
    }

    /// Attach a join scope; the task leaves it on completion.
    #[inline]
    pub fn end_count(
        mut self,
        end: Arc<EndCount>,
    ) -> Self {
        self.end = Some(end);
        self
    }

    /// Build the task with the given ID and entry closure.
    pub fn build<F>(
        self,
        id: TaskId,
        entry: F,
    ) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        let name = self.name.unwrap_or_else(|| format!("Task({})", id.inner()));

        Task {
            id,
            name,
            state: AtomicU8::new(TaskState::Ready.as_u8()),
            locale: self.locale,
            entry: Mutex::new(Some(Box::new(entry))),
            end: self.end,
        }
    }
}

/// Generator for task IDs, shared across spawning threads.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next task ID.
    #[inline]
    pub fn next_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
