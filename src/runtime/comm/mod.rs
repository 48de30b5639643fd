//! One-sided communication layer
//!
//! Get/put of contiguous and strided memory regions between locales. All
//! transfers block the calling task until the data has landed; within one
//! task, successive transfers to the same region observe program order.
//! Across tasks no ordering exists unless the program establishes it with
//! a synchronization cell or a join scope.
//!
//! When the owning locale of the remote side is the calling locale, the
//! transfer short-circuits to a plain local copy; the result is identical
//! to the routed path, only faster.

pub mod strided;
pub(crate) mod transport;

pub use strided::{StrideLevel, StridedSpec};

use std::sync::Arc;

use crossbeam::channel::bounded;

use crate::runtime::locale::{self, LocaleId};
use crate::runtime::memory::{MemError, RemoteRef, SegmentTable};
use crate::runtime::scheduler::blocking;

use transport::{check_extent, Request, Router};

/// Communication failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommError {
    /// The locale id does not name a locale of this runtime.
    #[error("locale out of range: {locale} (runtime has {num_locales} locales)")]
    LocaleOutOfRange { locale: LocaleId, num_locales: u16 },

    /// The owning locale's daemon is gone (runtime shut down mid-call).
    #[error("communication with {locale} lost")]
    Disconnected { locale: LocaleId },

    /// Segment-level failure on the owning locale.
    #[error(transparent)]
    Mem(#[from] MemError),

    /// The strided descriptor does not denote a valid region.
    #[error("malformed strided descriptor: {reason}")]
    BadDescriptor { reason: String },

    /// Source and destination descriptors disagree on element size or
    /// total element count.
    #[error(
        "shape mismatch: source {src_elems} x {src_elem_size}B, \
         destination {dst_elems} x {dst_elem_size}B"
    )]
    ShapeMismatch {
        src_elems: usize,
        src_elem_size: usize,
        dst_elems: usize,
        dst_elem_size: usize,
    },

    /// A caller-side buffer is too small for the described region.
    #[error("buffer too small: region needs {need} bytes, buffer has {have}")]
    ShortBuffer { need: usize, have: usize },
}

/// The data-movement substrate shared by every locale of a runtime.
///
/// Holds the routing table and every locale's segment table; which path a
/// transfer takes depends only on whether the owning locale is the calling
/// one.
#[derive(Debug)]
pub(crate) struct CommLayer {
    router: Router,
    tables: Vec<Arc<SegmentTable>>,
}

impl CommLayer {
    pub(crate) fn new(
        router: Router,
        tables: Vec<Arc<SegmentTable>>,
    ) -> Self {
        Self { router, tables }
    }

    fn table(
        &self,
        locale: LocaleId,
    ) -> Result<&Arc<SegmentTable>, CommError> {
        self.tables
            .get(locale.index())
            .ok_or(CommError::LocaleOutOfRange {
                locale,
                num_locales: self.router.num_locales(),
            })
    }

    /// Allocate a zero-filled segment of `len` bytes on `locale`.
    pub(crate) fn alloc_on(
        &self,
        locale: LocaleId,
        len: usize,
    ) -> Result<RemoteRef, CommError> {
        let table = self.table(locale)?;
        Ok(RemoteRef::new(locale, table.alloc(len)))
    }

    /// Free a segment.
    pub(crate) fn free(
        &self,
        handle: RemoteRef,
    ) -> Result<(), CommError> {
        Ok(self.table(handle.locale)?.free(handle.segment)?)
    }

    /// Copy `dst.len()` bytes from `src`'s address space into the caller's
    /// buffer. Blocks the calling task until the bytes are local.
    pub(crate) fn get(
        &self,
        dst: &mut [u8],
        src: RemoteRef,
    ) -> Result<(), CommError> {
        let table = self.table(src.locale)?;

        if src.locale == locale::here() {
            return Ok(table.read_into(src.segment, src.offset, dst)?);
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.router.send(
            src.locale,
            Request::Get {
                segment: src.segment,
                offset: src.offset,
                len: dst.len(),
                reply: reply_tx,
            },
        )?;
        let bytes = blocking::section(|| reply_rx.recv())
            .map_err(|_| CommError::Disconnected { locale: src.locale })??;
        dst.copy_from_slice(&bytes);
        Ok(())
    }

    /// Copy the caller's buffer into `dst`'s address space. Blocks the
    /// calling task until the owning locale has the bytes.
    pub(crate) fn put(
        &self,
        dst: RemoteRef,
        src: &[u8],
    ) -> Result<(), CommError> {
        let table = self.table(dst.locale)?;

        if dst.locale == locale::here() {
            return Ok(table.write_from(dst.segment, dst.offset, src)?);
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.router.send(
            dst.locale,
            Request::Put {
                segment: dst.segment,
                offset: dst.offset,
                data: src.to_vec(),
                reply: reply_tx,
            },
        )?;
        blocking::section(|| reply_rx.recv())
            .map_err(|_| CommError::Disconnected { locale: dst.locale })?
    }

    /// Strided get: gather `src_spec` out of `src`'s segment, scatter into
    /// the caller's buffer through `dst_spec`, pairing elements in
    /// row-major order.
    pub(crate) fn get_strided(
        &self,
        dst: &mut [u8],
        dst_spec: &StridedSpec,
        src: RemoteRef,
        src_spec: &StridedSpec,
    ) -> Result<(), CommError> {
        check_shapes(dst_spec, src_spec)?;
        check_buffer(dst.len(), dst_spec)?;
        let table = self.table(src.locale)?;
        let src_spec = shifted(src_spec, src.offset);

        if src.locale == locale::here() {
            check_extent(table, src.segment, &src_spec)?;
            table.with_bytes(src.segment, |bytes| {
                strided::copy_strided(dst, dst_spec, bytes, &src_spec);
            })?;
            return Ok(());
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.router.send(
            src.locale,
            Request::GetStrided {
                segment: src.segment,
                spec: src_spec,
                reply: reply_tx,
            },
        )?;
        let packed = blocking::section(|| reply_rx.recv())
            .map_err(|_| CommError::Disconnected { locale: src.locale })??;
        dst_spec.unpack(dst, &packed);
        Ok(())
    }

    /// Strided put: gather `src_spec` out of the caller's buffer, scatter
    /// into `dst`'s segment through `dst_spec`.
    pub(crate) fn put_strided(
        &self,
        dst: RemoteRef,
        dst_spec: &StridedSpec,
        src: &[u8],
        src_spec: &StridedSpec,
    ) -> Result<(), CommError> {
        check_shapes(dst_spec, src_spec)?;
        check_buffer(src.len(), src_spec)?;
        let table = self.table(dst.locale)?;
        let dst_spec = shifted(dst_spec, dst.offset);

        if dst.locale == locale::here() {
            check_extent(table, dst.segment, &dst_spec)?;
            table.with_bytes_mut(dst.segment, |bytes| {
                strided::copy_strided(bytes, &dst_spec, src, src_spec);
            })?;
            return Ok(());
        }

        let packed = src_spec.pack(src);
        let (reply_tx, reply_rx) = bounded(1);
        self.router.send(
            dst.locale,
            Request::PutStrided {
                segment: dst.segment,
                spec: dst_spec,
                data: packed,
                reply: reply_tx,
            },
        )?;
        blocking::section(|| reply_rx.recv())
            .map_err(|_| CommError::Disconnected { locale: dst.locale })?
    }

    /// Ship a task to `target`'s daemon for execution there.
    pub(crate) fn ship_spawn(
        &self,
        target: LocaleId,
        origin: LocaleId,
        end: Arc<crate::runtime::scheduler::EndCount>,
        entry: crate::runtime::scheduler::TaskEntry,
    ) -> Result<(), CommError> {
        self.router.send(target, Request::Spawn { entry, origin, end })
    }
}

/// Both sides of a strided transfer must denote the same element size and
/// total element count; per-dimension shapes are free to differ.
fn check_shapes(
    dst_spec: &StridedSpec,
    src_spec: &StridedSpec,
) -> Result<(), CommError> {
    if dst_spec.elem_size != src_spec.elem_size
        || dst_spec.total_elems() != src_spec.total_elems()
    {
        return Err(CommError::ShapeMismatch {
            src_elems: src_spec.total_elems(),
            src_elem_size: src_spec.elem_size,
            dst_elems: dst_spec.total_elems(),
            dst_elem_size: dst_spec.elem_size,
        });
    }
    Ok(())
}

/// The caller-side buffer must contain the whole described region.
fn check_buffer(
    have: usize,
    spec: &StridedSpec,
) -> Result<(), CommError> {
    let need = spec.required_len().ok_or_else(|| CommError::BadDescriptor {
        reason: "strided extent overflows usize".into(),
    })?;
    if need > have {
        return Err(CommError::ShortBuffer { need, have });
    }
    Ok(())
}

/// A spec displaced by the handle's byte offset.
fn shifted(
    spec: &StridedSpec,
    by: usize,
) -> StridedSpec {
    StridedSpec {
        base: spec.base + by,
        ..spec.clone()
    }
}

#[cfg(test)]
mod tests;
