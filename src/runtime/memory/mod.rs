//! Per-locale memory segments
//!
//! Remote-capable data lives in byte segments owned by exactly one locale.
//! A segment is addressed by a [`SegmentId`] plus a byte offset; the pair of
//! owning locale and address forms a [`RemoteRef`]. Bytes in another
//! locale's segments are only reachable through the communication layer,
//! never by direct dereference.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::runtime::locale::LocaleId;

/// Identifier of a segment within one locale's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(pub u32);

impl SegmentId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "segment({})", self.0)
    }
}

/// A remote-capable memory handle: owning locale, segment, byte offset.
///
/// The handle itself carries no access rights; it is only meaningful when
/// presented to the communication layer, which routes the access to the
/// owning locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteRef {
    /// Locale that owns the bytes.
    pub locale: LocaleId,
    /// Segment within that locale's table.
    pub segment: SegmentId,
    /// Byte offset into the segment.
    pub offset: usize,
}

impl RemoteRef {
    /// Create a handle to the start of a segment.
    #[inline]
    pub fn new(
        locale: LocaleId,
        segment: SegmentId,
    ) -> Self {
        Self {
            locale,
            segment,
            offset: 0,
        }
    }

    /// A handle displaced `bytes` further into the same segment.
    #[inline]
    pub fn at(
        self,
        bytes: usize,
    ) -> Self {
        Self {
            offset: self.offset + bytes,
            ..self
        }
    }
}

/// Memory access error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemError {
    /// The segment id does not name a live segment.
    #[error("no such segment: {segment} on {locale}")]
    BadSegment { locale: LocaleId, segment: SegmentId },

    /// The access runs past the end of the segment.
    #[error("access out of bounds: offset {offset} + len {len} > segment size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// Table of byte segments owned by one locale.
///
/// Allocation hands out zero-filled segments. Reads and writes are bounds
/// checked; the table lock serializes writes to the same locale but imposes
/// no ordering between transfers touching different locales.
#[derive(Debug)]
pub struct SegmentTable {
    /// Locale that owns this table.
    locale: LocaleId,
    /// Live segments.
    segments: RwLock<IndexMap<SegmentId, Vec<u8>>>,
    /// Next segment id to hand out.
    next_id: AtomicU32,
}

impl SegmentTable {
    /// Create an empty table for `locale`.
    pub fn new(locale: LocaleId) -> Self {
        Self {
            locale,
            segments: RwLock::new(IndexMap::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Owning locale.
    #[inline]
    pub fn locale(&self) -> LocaleId {
        self.locale
    }

    /// Allocate a zero-filled segment of `len` bytes.
    pub fn alloc(
        &self,
        len: usize,
    ) -> SegmentId {
        let id = SegmentId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.segments.write().insert(id, vec![0u8; len]);
        id
    }

    /// Free a segment. Freeing an unknown id is an error.
    pub fn free(
        &self,
        id: SegmentId,
    ) -> Result<(), MemError> {
        match self.segments.write().swap_remove(&id) {
            Some(_) => Ok(()),
            None => Err(MemError::BadSegment {
                locale: self.locale,
                segment: id,
            }),
        }
    }

    /// Size in bytes of a segment.
    pub fn len_of(
        &self,
        id: SegmentId,
    ) -> Result<usize, MemError> {
        let segments = self.segments.read();
        segments.get(&id).map(Vec::len).ok_or(MemError::BadSegment {
            locale: self.locale,
            segment: id,
        })
    }

    /// Number of live segments.
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Copy `dst.len()` bytes out of a segment starting at `offset`.
    pub fn read_into(
        &self,
        id: SegmentId,
        offset: usize,
        dst: &mut [u8],
    ) -> Result<(), MemError> {
        let segments = self.segments.read();
        let bytes = segments.get(&id).ok_or(MemError::BadSegment {
            locale: self.locale,
            segment: id,
        })?;
        Self::check_bounds(offset, dst.len(), bytes.len())?;
        dst.copy_from_slice(&bytes[offset..offset + dst.len()]);
        Ok(())
    }

    /// Copy `src` into a segment starting at `offset`.
    pub fn write_from(
        &self,
        id: SegmentId,
        offset: usize,
        src: &[u8],
    ) -> Result<(), MemError> {
        let mut segments = self.segments.write();
        let bytes = segments.get_mut(&id).ok_or(MemError::BadSegment {
            locale: self.locale,
            segment: id,
        })?;
        Self::check_bounds(offset, src.len(), bytes.len())?;
        bytes[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Run `f` over the raw bytes of a segment.
    pub fn with_bytes<R>(
        &self,
        id: SegmentId,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, MemError> {
        let segments = self.segments.read();
        let bytes = segments.get(&id).ok_or(MemError::BadSegment {
            locale: self.locale,
            segment: id,
        })?;
        Ok(f(bytes))
    }

    /// Run `f` over the raw bytes of a segment, mutably.
    pub fn with_bytes_mut<R>(
        &self,
        id: SegmentId,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, MemError> {
        let mut segments = self.segments.write();
        let bytes = segments.get_mut(&id).ok_or(MemError::BadSegment {
            locale: self.locale,
            segment: id,
        })?;
        Ok(f(bytes))
    }

    #[inline]
    fn check_bounds(
        offset: usize,
        len: usize,
        size: usize,
    ) -> Result<(), MemError> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(MemError::OutOfBounds { offset, len, size }),
        }
    }
}
