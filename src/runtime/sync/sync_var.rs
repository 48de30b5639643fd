//! Full/empty synchronization cells.

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::runtime::scheduler::BlockingSection;

/// Payload slot and fullness flag, guarded by the cell mutex.
///
/// `full` implies the slot holds a value; transitions happen only while the
/// mutex is held.
#[derive(Debug)]
struct State<T> {
    full: bool,
    value: Option<T>,
}

/// A single-slot blocking cell with explicit full/empty state.
///
/// Writes that require emptiness block while the cell is full; reads that
/// require fullness block while it is empty. The mutex is the sole
/// serialization point for the payload and the flag. Waits are wrapped in a
/// [`BlockingSection`] so a blocked task frees its worker.
///
/// Waiters are woken all at once on each transition and race for the mutex.
#[derive(Debug)]
pub struct SyncVar<T> {
    state: Mutex<State<T>>,
    full_cv: Condvar,
    empty_cv: Condvar,
}

impl<T: Send> SyncVar<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                full: false,
                value: None,
            }),
            full_cv: Condvar::new(),
            empty_cv: Condvar::new(),
        }
    }

    /// Create a cell that starts full with `value`.
    pub fn full(value: T) -> Self {
        Self {
            state: Mutex::new(State {
                full: true,
                value: Some(value),
            }),
            full_cv: Condvar::new(),
            empty_cv: Condvar::new(),
        }
    }

    /// Block until the cell is full, returning with the mutex held.
    fn lock_when_full(&self) -> MutexGuard<'_, State<T>> {
        let mut state = self.state.lock();
        if !state.full {
            let _section = BlockingSection::enter();
            while !state.full {
                self.full_cv.wait(&mut state);
            }
        }
        state
    }

    /// Block until the cell is empty, returning with the mutex held.
    fn lock_when_empty(&self) -> MutexGuard<'_, State<T>> {
        let mut state = self.state.lock();
        if state.full {
            let _section = BlockingSection::enter();
            while state.full {
                self.empty_cv.wait(&mut state);
            }
        }
        state
    }

    /// Mark full, release the mutex, wake all full-waiters.
    fn mark_full(
        &self,
        mut state: MutexGuard<'_, State<T>>,
    ) {
        state.full = true;
        drop(state);
        self.full_cv.notify_all();
    }

    /// Mark empty, release the mutex, wake all empty-waiters.
    fn mark_empty(
        &self,
        mut state: MutexGuard<'_, State<T>>,
    ) {
        state.full = false;
        state.value = None;
        drop(state);
        self.empty_cv.notify_all();
    }

    /// Empty-then-fill write: block while full, store, mark full.
    pub fn write_ef(
        &self,
        value: T,
    ) {
        let mut state = self.lock_when_empty();
        state.value = Some(value);
        self.mark_full(state);
    }

    /// Full-then-refill write: block while empty, overwrite, stay full.
    pub fn write_ff(
        &self,
        value: T,
    ) {
        let mut state = self.lock_when_full();
        state.value = Some(value);
        self.mark_full(state);
    }

    /// Unconditional write: store regardless of state, mark full.
    pub fn write_xf(
        &self,
        value: T,
    ) {
        let mut state = self.state.lock();
        state.value = Some(value);
        self.mark_full(state);
    }

    /// Full-then-empty read: block while empty, take the value, mark empty.
    pub fn read_fe(&self) -> T {
        let mut state = self.lock_when_full();
        let value = state.value.take().expect("full sync var without payload");
        self.mark_empty(state);
        value
    }

    /// Full-then-refill read: block while empty, copy the value, stay full
    /// so further readers observe it too.
    pub fn read_ff(&self) -> T
    where
        T: Clone,
    {
        let state = self.lock_when_full();
        let value = state
            .value
            .clone()
            .expect("full sync var without payload");
        self.mark_full(state);
        value
    }

    /// Unconditional read of the current payload, `None` while empty.
    pub fn read_xx(&self) -> Option<T>
    where
        T: Clone,
    {
        self.state.lock().value.clone()
    }

    /// Reset the cell to empty, discarding any payload, and wake
    /// empty-waiters.
    pub fn reset(&self) {
        let state = self.state.lock();
        self.mark_empty(state);
    }

    /// Current fullness. Only a snapshot: the state may change the moment
    /// the mutex is released.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.state.lock().full
    }
}

impl<T: Send> Default for SyncVar<T> {
    fn default() -> Self {
        Self::new()
    }
}
