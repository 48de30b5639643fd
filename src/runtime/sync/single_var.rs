//! Write-once synchronization cells.

use std::panic::Location;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};

use super::SyncVarError;
use crate::runtime::scheduler::BlockingSection;

/// A cell whose fill transition is monotonic: once full it stays full until
/// an explicit (exclusive) reset.
///
/// The payload lives in a [`OnceCell`], so a reader that already observed
/// fullness copies the value without touching the blocking path at all —
/// the cell's internal synchronization makes the payload write
/// happen-before any successful `get`. The mutex/condvar pair only serves
/// readers that arrive while the cell is still empty.
///
/// Writing an already-full cell is a user-visible error carrying the source
/// location of the offending write, not a blocking wait.
#[derive(Debug)]
pub struct SingleVar<T> {
    cell: OnceCell<T>,
    wait_mx: Mutex<()>,
    full_cv: Condvar,
}

impl<T: Send + Sync> SingleVar<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            wait_mx: Mutex::new(()),
            full_cv: Condvar::new(),
        }
    }

    /// Empty-then-fill write. Errors if the cell is already defined.
    #[track_caller]
    pub fn write_ef(
        &self,
        value: T,
    ) -> Result<(), SyncVarError> {
        let location = Location::caller();
        if self.cell.set(value).is_err() {
            return Err(SyncVarError::AlreadyFull {
                file: location.file(),
                line: location.line(),
            });
        }

        // Pairs with the re-check under the mutex in read_ff: a reader
        // either sees the value directly or is parked on the condvar when
        // this notify lands.
        drop(self.wait_mx.lock());
        self.full_cv.notify_all();
        Ok(())
    }

    /// Blocking read: waits until the cell is full, then copies the value.
    pub fn read_ff(&self) -> T
    where
        T: Clone,
    {
        // Fast path: fullness is monotonic, no lock needed once observed.
        if let Some(value) = self.cell.get() {
            return value.clone();
        }

        let mut guard = self.wait_mx.lock();
        if self.cell.get().is_none() {
            let _section = BlockingSection::enter();
            while self.cell.get().is_none() {
                self.full_cv.wait(&mut guard);
            }
        }
        drop(guard);

        self.cell
            .get()
            .cloned()
            .expect("single var signalled full without payload")
    }

    /// Non-blocking fast-path read: the value if the cell is already full.
    #[inline]
    pub fn try_read(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.get().cloned()
    }

    /// Current fullness.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Reset to empty. Requires exclusive access: reinitializing a cell
    /// while other threads hold references is not a supported operation,
    /// and the `&mut` receiver encodes that.
    pub fn reset(&mut self) {
        self.cell = OnceCell::new();
    }
}

impl<T: Send + Sync> Default for SingleVar<T> {
    fn default() -> Self {
        Self::new()
    }
}
