//! Strided region descriptors.
//!
//! A [`StridedSpec`] names a multi-dimensional sub-region of a flat byte
//! buffer: a base byte offset, the size of one contiguous element, and a
//! list of (stride, count) levels, outermost first. Enumerating the region
//! visits elements in row-major order; transfers pair the i-th element on
//! the source side with the i-th on the destination side, so the two
//! shapes may differ as long as element size and total count agree.

use smallvec::SmallVec;

/// One dimension of a strided region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrideLevel {
    /// Distance in bytes between consecutive entries of this dimension.
    pub stride: usize,
    /// Number of entries.
    pub count: usize,
}

/// Multi-dimensional sub-region of a flat buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedSpec {
    /// Byte offset of the first element.
    pub base: usize,
    /// Size in bytes of one contiguous element.
    pub elem_size: usize,
    /// Dimensions, outermost first. Empty means a single contiguous run of
    /// `elem_size` bytes at `base`.
    pub levels: SmallVec<[StrideLevel; 4]>,
}

impl StridedSpec {
    /// A flat contiguous region of `len` bytes at `base`.
    pub fn flat(
        base: usize,
        len: usize,
    ) -> Self {
        Self {
            base,
            elem_size: len,
            levels: SmallVec::new(),
        }
    }

    /// A strided region from (stride, count) pairs, outermost first.
    pub fn new(
        base: usize,
        elem_size: usize,
        levels: &[(usize, usize)],
    ) -> Self {
        Self {
            base,
            elem_size,
            levels: levels
                .iter()
                .map(|&(stride, count)| StrideLevel { stride, count })
                .collect(),
        }
    }

    /// Total number of elements (product of level counts).
    pub fn total_elems(&self) -> usize {
        self.levels.iter().map(|l| l.count).product()
    }

    /// Total payload size in bytes.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.total_elems() * self.elem_size
    }

    /// Smallest buffer size the region fits in, or `None` on overflow.
    ///
    /// Any level with count 0 makes the region empty and the answer 0.
    pub fn required_len(&self) -> Option<usize> {
        if self.total_elems() == 0 {
            return Some(0);
        }
        let mut end = self.base.checked_add(self.elem_size)?;
        for level in &self.levels {
            end = end.checked_add(level.stride.checked_mul(level.count - 1)?)?;
        }
        Some(end)
    }

    /// Byte offsets of every element, in row-major order (outermost
    /// dimension varies slowest).
    pub fn offsets(&self) -> OffsetIter<'_> {
        OffsetIter {
            spec: self,
            counters: self.levels.iter().map(|_| 0).collect(),
            remaining: self.total_elems(),
        }
    }

    /// Gather the region out of `src` into a contiguous buffer.
    pub fn pack(
        &self,
        src: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes());
        for off in self.offsets() {
            out.extend_from_slice(&src[off..off + self.elem_size]);
        }
        out
    }

    /// Scatter a contiguous buffer into the region of `dst`.
    ///
    /// `data` must hold exactly `total_bytes()` bytes.
    pub fn unpack(
        &self,
        dst: &mut [u8],
        data: &[u8],
    ) {
        debug_assert_eq!(data.len(), self.total_bytes());
        for (i, off) in self.offsets().enumerate() {
            let chunk = &data[i * self.elem_size..(i + 1) * self.elem_size];
            dst[off..off + self.elem_size].copy_from_slice(chunk);
        }
    }
}

/// Row-major enumeration of element byte offsets.
#[derive(Debug)]
pub struct OffsetIter<'a> {
    spec: &'a StridedSpec,
    /// One counter per level, outermost first.
    counters: SmallVec<[usize; 4]>,
    remaining: usize,
}

impl Iterator for OffsetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let offset = self.spec.base
            + self
                .counters
                .iter()
                .zip(&self.spec.levels)
                .map(|(&idx, level)| idx * level.stride)
                .sum::<usize>();

        // Odometer increment, innermost level first.
        for (idx, level) in self
            .counters
            .iter_mut()
            .zip(&self.spec.levels)
            .rev()
        {
            *idx += 1;
            if *idx < level.count {
                break;
            }
            *idx = 0;
        }

        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for OffsetIter<'_> {}

/// Copy element-by-element between two regions of local buffers.
///
/// Callers must have validated that both specs agree on element size and
/// total count.
pub(crate) fn copy_strided(
    dst: &mut [u8],
    dst_spec: &StridedSpec,
    src: &[u8],
    src_spec: &StridedSpec,
) {
    let elem = src_spec.elem_size;
    for (dst_off, src_off) in dst_spec.offsets().zip(src_spec.offsets()) {
        dst[dst_off..dst_off + elem].copy_from_slice(&src[src_off..src_off + elem]);
    }
}
