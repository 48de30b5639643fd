//! Synchronization variable core
//!
//! Full/empty cells ([`SyncVar`]) and write-once cells ([`SingleVar`]) are
//! the blocking building blocks every higher-level synchronization in the
//! runtime composes from. A cell holds a typed payload guarded by a mutex
//! and a fullness flag; readers and writers block until the flag reaches
//! the state their operation requires.
//!
//! Wake policy: all waiters for a state transition are woken and race to
//! re-acquire the cell mutex; losers observe the flag already consumed and
//! go back to sleep. Both cells document this explicitly — a fair queue
//! would satisfy the same invariants with different fairness trade-offs.

mod single_var;
mod sync_var;

pub use single_var::SingleVar;
pub use sync_var::SyncVar;

/// Synchronization cell misuse, reported to the caller with the source
/// location of the offending operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncVarError {
    /// A write-once cell was written a second time without a reset.
    #[error("single var already defined (write at {file}:{line})")]
    AlreadyFull { file: &'static str, line: u32 },
}

#[cfg(test)]
mod tests;
