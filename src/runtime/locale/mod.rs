//! Locale addressing model
//!
//! A locale is an independent address space and execution domain, identified
//! by a stable integer that never changes for the lifetime of the process.
//! Every remote-capable memory handle and every spawn target names a locale;
//! `here()` answers which locale the calling task is executing on.

use std::cell::Cell;
use std::fmt;

/// Identifier of a locale, in `[0, num_locales)`.
///
/// Locale ids are assigned densely at runtime startup and are immutable
/// afterwards. They are plain integers so they can travel inside messages
/// and handles without any lifetime ties to the runtime that minted them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocaleId(pub u16);

impl LocaleId {
    /// Locale 0, where program startup and the main join scope live.
    pub const ORIGIN: LocaleId = LocaleId(0);

    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u16 {
        self.0
    }

    /// Get the inner value widened to `usize` for indexing.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for LocaleId {
    fn from(val: u16) -> Self {
        Self(val)
    }
}

impl fmt::Display for LocaleId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "locale({})", self.0)
    }
}

thread_local! {
    /// Locale the current thread executes on behalf of. Worker and
    /// communication daemon threads set this once at startup.
    static HERE: Cell<LocaleId> = const { Cell::new(LocaleId(0)) };

    /// Locale count of the runtime this thread belongs to.
    static NUM_LOCALES: Cell<u16> = const { Cell::new(1) };
}

/// The locale the calling task is executing on.
///
/// Threads that were never adopted by a runtime (e.g. the process main
/// thread before `Runtime::new`) report [`LocaleId::ORIGIN`].
#[inline]
pub fn here() -> LocaleId {
    HERE.with(|h| h.get())
}

/// Number of locales in the runtime the calling thread belongs to.
///
/// Fixed at runtime startup; `1` on threads outside any runtime.
#[inline]
pub fn num_locales() -> u16 {
    NUM_LOCALES.with(|n| n.get())
}

/// Adopt the calling thread into a locale. Called by worker and daemon
/// threads at startup and by the runtime constructor for its own thread.
pub(crate) fn adopt(
    locale: LocaleId,
    locales: u16,
) {
    HERE.with(|h| h.set(locale));
    NUM_LOCALES.with(|n| n.set(locales));
}
