//! Weft Parallel Runtime
//!
//! The concurrency and data-movement substrate under the Weft parallel
//! language: lightweight tasks over a bounded worker pool, full/empty and
//! write-once synchronization variables, end-count join scopes, and
//! one-sided (optionally strided) data movement between locales.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use weft_runtime::runtime::{EndCount, Runtime, SyncVar};
//!
//! let rt = Runtime::new();
//! let cell = Arc::new(SyncVar::new());
//!
//! let scope = EndCount::new();
//! let writer = cell.clone();
//! rt.spawn(weft_runtime::runtime::LocaleId(0), &scope, move || {
//!     writer.write_ef(42);
//! })
//! .unwrap();
//!
//! assert_eq!(cell.read_ff(), 42);
//! scope.wait();
//! ```

#![doc(html_root_url = "https://docs.rs/weft-runtime")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use runtime::{
    here, num_locales, CommError, EndCount, LocaleId, RemoteRef, Runtime, RuntimeError,
    SingleVar, StridedSpec, SyncVar, SyncVarError,
};
pub use util::config::RuntimeConfig;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "Weft Runtime";
