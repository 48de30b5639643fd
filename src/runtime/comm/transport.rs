//! In-process transport between locales.
//!
//! Each locale runs one communication daemon thread draining a channel of
//! [`Request`]s. Remote gets and puts resolve against the owning locale's
//! segment table on its daemon; remote spawns are enqueued on the owning
//! locale's pool, wrapped so completion travels back to the origin locale
//! as a message rather than a direct counter update.
//!
//! The request encoding is internal to the runtime: nothing here is a
//! stable wire format.

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, trace};

use crate::runtime::comm::strided::StridedSpec;
use crate::runtime::comm::CommError;
use crate::runtime::locale::{self, LocaleId};
use crate::runtime::memory::{SegmentId, SegmentTable};
use crate::runtime::scheduler::{EndCount, TaskEntry, TaskPool};

/// One message to a locale's communication daemon.
pub(crate) enum Request {
    /// Execute a task on this locale for `origin`, reporting completion
    /// back to `end` on the origin locale.
    Spawn {
        entry: TaskEntry,
        origin: LocaleId,
        end: Arc<EndCount>,
    },
    /// A task this locale spawned remotely has completed.
    Done { end: Arc<EndCount> },
    /// Read `len` bytes from a local segment and reply with them.
    Get {
        segment: SegmentId,
        offset: usize,
        len: usize,
        reply: Sender<Result<Vec<u8>, CommError>>,
    },
    /// Write bytes into a local segment.
    Put {
        segment: SegmentId,
        offset: usize,
        data: Vec<u8>,
        reply: Sender<Result<(), CommError>>,
    },
    /// Gather a strided region of a local segment and reply with the
    /// packed bytes.
    GetStrided {
        segment: SegmentId,
        spec: StridedSpec,
        reply: Sender<Result<Vec<u8>, CommError>>,
    },
    /// Scatter packed bytes into a strided region of a local segment.
    PutStrided {
        segment: SegmentId,
        spec: StridedSpec,
        data: Vec<u8>,
        reply: Sender<Result<(), CommError>>,
    },
    /// Stop the daemon. Sent once per locale at runtime shutdown.
    Shutdown,
}

/// Sends the completion message for one remotely spawned task when
/// dropped, whether the task body returned or unwound.
struct DoneGuard {
    router: Router,
    origin: LocaleId,
    end: Option<Arc<EndCount>>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        if let Some(end) = self.end.take() {
            let _ = self.router.send(self.origin, Request::Done { end });
        }
    }
}

/// Routing table: one sender per locale's daemon.
#[derive(Debug, Clone)]
pub(crate) struct Router {
    senders: Vec<Sender<Request>>,
}

impl Router {
    pub(crate) fn new(senders: Vec<Sender<Request>>) -> Self {
        Self { senders }
    }

    /// Send a request to `locale`'s daemon.
    pub(crate) fn send(
        &self,
        locale: LocaleId,
        request: Request,
    ) -> Result<(), CommError> {
        let sender = self
            .senders
            .get(locale.index())
            .ok_or(CommError::LocaleOutOfRange {
                locale,
                num_locales: self.senders.len() as u16,
            })?;
        sender
            .send(request)
            .map_err(|_| CommError::Disconnected { locale })
    }

    pub(crate) fn num_locales(&self) -> u16 {
        self.senders.len() as u16
    }
}

/// Daemon main loop for one locale. Exits when every sender to this
/// locale's channel is dropped (runtime shutdown).
pub(crate) fn daemon_loop(
    locale: LocaleId,
    num_locales: u16,
    rx: Receiver<Request>,
    pool: Arc<TaskPool>,
    mem: Arc<SegmentTable>,
    router: Router,
) {
    locale::adopt(locale, num_locales);
    debug!(%locale, "communication daemon up");

    while let Ok(request) = rx.recv() {
        match request {
            Request::Spawn { entry, origin, end } => {
                trace!(%locale, %origin, "remote spawn arrived");
                let done = DoneGuard {
                    router: router.clone(),
                    origin,
                    end: Some(end),
                };
                pool.spawn_detached(move || {
                    // The guard reports completion to the origin locale
                    // even if the entry panics out of this frame.
                    let _done = done;
                    entry();
                });
            }
            Request::Done { end } => {
                end.leave();
            }
            Request::Get {
                segment,
                offset,
                len,
                reply,
            } => {
                let mut buf = vec![0u8; len];
                let result = mem
                    .read_into(segment, offset, &mut buf)
                    .map(|()| buf)
                    .map_err(CommError::from);
                let _ = reply.send(result);
            }
            Request::Put {
                segment,
                offset,
                data,
                reply,
            } => {
                let result = mem
                    .write_from(segment, offset, &data)
                    .map_err(CommError::from);
                let _ = reply.send(result);
            }
            Request::GetStrided {
                segment,
                spec,
                reply,
            } => {
                let result = gather(&mem, segment, &spec);
                let _ = reply.send(result);
            }
            Request::PutStrided {
                segment,
                spec,
                data,
                reply,
            } => {
                let result = scatter(&mem, segment, &spec, &data);
                let _ = reply.send(result);
            }
            Request::Shutdown => break,
        }
    }

    debug!(%locale, "communication daemon down");
}

/// Pack a strided region of a segment into contiguous bytes.
fn gather(
    mem: &SegmentTable,
    segment: SegmentId,
    spec: &StridedSpec,
) -> Result<Vec<u8>, CommError> {
    check_extent(mem, segment, spec)?;
    Ok(mem.with_bytes(segment, |bytes| spec.pack(bytes))?)
}

/// Scatter contiguous bytes into a strided region of a segment.
fn scatter(
    mem: &SegmentTable,
    segment: SegmentId,
    spec: &StridedSpec,
    data: &[u8],
) -> Result<(), CommError> {
    check_extent(mem, segment, spec)?;
    mem.with_bytes_mut(segment, |bytes| spec.unpack(bytes, data))?;
    Ok(())
}

/// Validate that a strided region fits inside a segment before the first
/// byte moves; strided transfers have no partial-success semantics.
pub(crate) fn check_extent(
    mem: &SegmentTable,
    segment: SegmentId,
    spec: &StridedSpec,
) -> Result<(), CommError> {
    let size = mem.len_of(segment)?;
    let required = spec
        .required_len()
        .ok_or_else(|| CommError::BadDescriptor {
            reason: "strided extent overflows usize".into(),
        })?;
    if required > size {
        return Err(CommError::BadDescriptor {
            reason: format!("strided extent {} exceeds segment size {}", required, size),
        });
    }
    Ok(())
}
