//! Runtime system
//!
//! Ties the substrate together: one task pool, one segment table, and one
//! communication daemon per locale, a process-wide main join scope, and
//! the spawn/get/put surface the generated code and libraries sit on.

pub mod comm;
pub mod locale;
pub mod memory;
pub mod scheduler;
pub mod sync;

pub use comm::{CommError, StrideLevel, StridedSpec};
pub use locale::{here, num_locales, LocaleId};
pub use memory::{MemError, RemoteRef, SegmentId};
pub use scheduler::{
    BlockingSection, CountBatch, EndCount, TaskId, TaskPool, TaskState,
};
pub use sync::{SingleVar, SyncVar, SyncVarError};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::util::config::RuntimeConfig;
use comm::transport::{self, Request, Router};
use comm::CommLayer;
use memory::SegmentTable;
use scheduler::PoolConfig;

/// Any failure surfaced by the runtime to its embedder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// Synchronization cell misuse.
    #[error(transparent)]
    Sync(#[from] SyncVarError),

    /// Communication failure.
    #[error(transparent)]
    Comm(#[from] CommError),

    /// Segment-level memory failure.
    #[error(transparent)]
    Mem(#[from] MemError),

    /// The configuration cannot describe a runnable runtime.
    #[error("invalid runtime configuration: {reason}")]
    Config { reason: String },

    /// A spawn named a locale outside `[0, num_locales)`.
    #[error("spawn target out of range: {locale} (runtime has {num_locales} locales)")]
    BadSpawnTarget { locale: LocaleId, num_locales: u16 },
}

/// A running Weft substrate: `num_locales` address spaces, each with its
/// own worker pool and communication daemon.
///
/// Locale membership is fixed for the lifetime of the value. The thread
/// constructing the runtime is adopted into locale 0, where program
/// startup and the main join scope live.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    pools: Vec<Arc<TaskPool>>,
    comm: CommLayer,
    router: Router,
    main_scope: Arc<EndCount>,
    daemons: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Runtime {
    /// Create a runtime from the process-wide configuration (defaults,
    /// config file, `WEFT_*` environment).
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env())
            .expect("environment-derived runtime configuration is invalid")
    }

    /// Create a runtime from an explicit configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        if config.num_locales == 0 {
            return Err(RuntimeError::Config {
                reason: "num_locales must be at least 1".into(),
            });
        }
        if config.workers_per_locale == 0 {
            return Err(RuntimeError::Config {
                reason: "workers_per_locale must be at least 1".into(),
            });
        }

        let num_locales = config.num_locales;
        let mut senders = Vec::with_capacity(num_locales as usize);
        let mut receivers = Vec::with_capacity(num_locales as usize);
        for _ in 0..num_locales {
            let (tx, rx) = crossbeam::channel::unbounded();
            senders.push(tx);
            receivers.push(rx);
        }
        let router = Router::new(senders);

        let tables: Vec<Arc<SegmentTable>> = (0..num_locales)
            .map(|l| Arc::new(SegmentTable::new(LocaleId(l))))
            .collect();

        let pools: Vec<Arc<TaskPool>> = (0..num_locales)
            .map(|l| {
                Arc::new(TaskPool::with_config(PoolConfig {
                    num_workers: config.workers_per_locale,
                    steal_batch: config.steal_batch,
                    idle_timeout: Duration::from_millis(config.idle_timeout_ms),
                    locale: Some(LocaleId(l)),
                    num_locales,
                }))
            })
            .collect();

        let daemons = receivers
            .into_iter()
            .enumerate()
            .map(|(l, rx)| {
                let locale = LocaleId(l as u16);
                let pool = Arc::clone(&pools[l]);
                let mem = Arc::clone(&tables[l]);
                let router = router.clone();
                thread::Builder::new()
                    .name(format!("weft-comm-{}", l))
                    .spawn(move || {
                        transport::daemon_loop(locale, num_locales, rx, pool, mem, router)
                    })
                    .expect("failed to spawn communication daemon")
            })
            .collect();

        let comm = CommLayer::new(router.clone(), tables);

        // The constructing thread becomes part of locale 0.
        locale::adopt(LocaleId::ORIGIN, num_locales);
        debug!(locales = num_locales, workers = config.workers_per_locale, "runtime up");

        Ok(Self {
            config,
            pools,
            comm,
            router,
            main_scope: EndCount::new(),
            daemons: Mutex::new(daemons),
        })
    }

    /// Number of locales.
    #[inline]
    pub fn num_locales(&self) -> u16 {
        self.config.num_locales
    }

    /// Iterate over all locale ids.
    pub fn locales(&self) -> impl Iterator<Item = LocaleId> {
        (0..self.config.num_locales).map(LocaleId)
    }

    /// The configuration the runtime was built from.
    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The process-wide main-program join scope, owned by locale 0.
    #[inline]
    pub fn main_scope(&self) -> &Arc<EndCount> {
        &self.main_scope
    }

    /// Worker pool of one locale.
    pub fn pool(
        &self,
        locale: LocaleId,
    ) -> Result<&Arc<TaskPool>, RuntimeError> {
        self.pools
            .get(locale.index())
            .ok_or(RuntimeError::BadSpawnTarget {
                locale,
                num_locales: self.config.num_locales,
            })
    }

    /// Spawn `f` as a task on `target`, tracked by `scope`.
    ///
    /// The scope is entered before the task can possibly run. Local spawns
    /// go straight to the target pool; remote spawns ship the closure to
    /// the target's daemon, and completion travels back to this locale as
    /// a message. Returns as soon as the task is registered — never waits
    /// for it.
    pub fn spawn<F>(
        &self,
        target: LocaleId,
        scope: &Arc<EndCount>,
        f: F,
    ) -> Result<(), RuntimeError>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.pool(target)?;

        if target == locale::here() {
            pool.spawn_into(scope, f);
            return Ok(());
        }

        scope.enter();
        let shipped = self
            .comm
            .ship_spawn(target, locale::here(), Arc::clone(scope), Box::new(f));
        if let Err(err) = shipped {
            // The task never became runnable; undo the registration.
            scope.leave();
            return Err(err.into());
        }
        Ok(())
    }

    /// Run `f` as the main program task on locale 0 and wait for it and
    /// every task transitively spawned into the main scope.
    pub fn run<F>(
        &self,
        f: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(LocaleId::ORIGIN, &self.main_scope, f)
            .expect("locale 0 always exists");
        self.main_scope.wait();
    }

    /// Allocate a zero-filled segment of `len` bytes on `locale`.
    pub fn alloc_on(
        &self,
        locale: LocaleId,
        len: usize,
    ) -> Result<RemoteRef, RuntimeError> {
        Ok(self.comm.alloc_on(locale, len)?)
    }

    /// Free a segment.
    pub fn free(
        &self,
        handle: RemoteRef,
    ) -> Result<(), RuntimeError> {
        Ok(self.comm.free(handle)?)
    }

    /// One-sided get: copy `dst.len()` bytes from `src` into the caller's
    /// buffer. Blocks the calling task until done.
    pub fn get(
        &self,
        dst: &mut [u8],
        src: RemoteRef,
    ) -> Result<(), RuntimeError> {
        Ok(self.comm.get(dst, src)?)
    }

    /// One-sided put: copy the caller's buffer into `dst`. Blocks the
    /// calling task until the owning locale has the bytes.
    pub fn put(
        &self,
        dst: RemoteRef,
        src: &[u8],
    ) -> Result<(), RuntimeError> {
        Ok(self.comm.put(dst, src)?)
    }

    /// Strided one-sided get; element i of the source region lands at
    /// element i of the destination region, row-major on both sides.
    pub fn get_strided(
        &self,
        dst: &mut [u8],
        dst_spec: &StridedSpec,
        src: RemoteRef,
        src_spec: &StridedSpec,
    ) -> Result<(), RuntimeError> {
        Ok(self.comm.get_strided(dst, dst_spec, src, src_spec)?)
    }

    /// Strided one-sided put.
    pub fn put_strided(
        &self,
        dst: RemoteRef,
        dst_spec: &StridedSpec,
        src: &[u8],
        src_spec: &StridedSpec,
    ) -> Result<(), RuntimeError> {
        Ok(self.comm.put_strided(dst, dst_spec, src, src_spec)?)
    }

    /// Stop daemons and worker pools.
    ///
    /// Callers are expected to have drained their join scopes first;
    /// queued-but-unstarted tasks are abandoned.
    pub fn shutdown(&self) {
        let mut daemons = self.daemons.lock();
        if daemons.is_empty() {
            return;
        }
        for locale in self.locales() {
            let _ = self.router.send(locale, Request::Shutdown);
        }
        for daemon in daemons.drain(..) {
            daemon.join().expect("communication daemon panicked");
        }
        for pool in &self.pools {
            pool.shutdown();
        }
        debug!("runtime down");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
