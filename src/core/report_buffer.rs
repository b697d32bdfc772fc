//! Report buffers - flat `f32` arrays reused across frames
//!
//! Layout: `header` leading slots (slot 0 is always the report kind tag),
//! followed by fixed-size items. Capacity grows in whole chunks of items so a
//! fluctuating object count does not reallocate every frame.
//!
//! A `ReportBuffer` is move-only. Sending it over a transfer-capable channel
//! moves it out of its encoder; the encoder must then allocate or reclaim another.

/// Owned report storage. Deliberately not `Clone`.
#[derive(Debug)]
pub struct ReportBuffer {
    data: Vec<f32>,
}

impl ReportBuffer {
    /// Allocate a zeroed buffer of exactly `len` floats with `kind` in slot 0
    pub fn with_len(kind: u8, len: usize) -> Self {
        let mut data = vec![0.0f32; len.max(1)];
        data[0] = kind as f32;
        Self { data }
    }

    /// Wrap floats received from the controller (a returned buffer)
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Kind tag stored in slot 0, if it is a valid small integer
    pub fn kind(&self) -> Option<u8> {
        let tag = *self.data.first()?;
        if tag >= 0.0 && tag <= u8::MAX as f32 && tag.fract() == 0.0 {
            Some(tag as u8)
        } else {
            None
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline(always)]
    pub fn set(&mut self, idx: usize, value: f32) {
        fast!(self.data, [idx] = value);
    }

    /// Hand the raw storage over (used by transports that copy into foreign memory)
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Item capacity of a buffer of `len` floats
#[inline]
pub fn item_capacity(len: usize, header: usize, item_size: usize) -> usize {
    len.saturating_sub(header) / item_size
}

/// Smallest chunk-aligned item count >= `items`
#[inline]
pub fn chunk_aligned(items: usize, chunk: usize) -> usize {
    let chunk = chunk.max(1);
    items.div_ceil(chunk) * chunk
}

/// Offset of item `index` for a given layout
#[inline(always)]
pub fn item_offset(header: usize, item_size: usize, index: usize) -> usize {
    header + index * item_size
}

/// Grow `buf` so it holds at least `items` items.
///
/// Returns `true` if a reallocation happened. Requests within the current
/// capacity never touch the buffer.
pub fn ensure_capacity(
    buf: &mut ReportBuffer,
    kind: u8,
    header: usize,
    item_size: usize,
    items: usize,
    chunk: usize,
) -> bool {
    if item_capacity(buf.len(), header, item_size) >= items {
        return false;
    }
    let len = header + chunk_aligned(items, chunk) * item_size;
    *buf = ReportBuffer::with_len(kind, len);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIND: u8 = 0;
    const HEADER: usize = 2;
    const ITEM: usize = 14;
    const CHUNK: usize = 50;

    #[test]
    fn within_capacity_never_reallocates() {
        let mut buf = ReportBuffer::with_len(KIND, HEADER + CHUNK * ITEM);
        buf.set(5, 42.0);
        for n in 0..=CHUNK {
            assert!(!ensure_capacity(&mut buf, KIND, HEADER, ITEM, n, CHUNK));
        }
        assert_eq!(buf.as_slice()[5], 42.0);
        assert_eq!(buf.len(), HEADER + CHUNK * ITEM);
    }

    #[test]
    fn growth_is_chunk_aligned_and_monotonic() {
        let mut buf = ReportBuffer::with_len(KIND, HEADER + CHUNK * ITEM);

        assert!(ensure_capacity(&mut buf, KIND, HEADER, ITEM, CHUNK + 1, CHUNK));
        assert_eq!(buf.len(), HEADER + 2 * CHUNK * ITEM);
        assert_eq!(buf.kind(), Some(KIND));

        // Shrinking request keeps the larger buffer.
        assert!(!ensure_capacity(&mut buf, KIND, HEADER, ITEM, 3, CHUNK));
        assert_eq!(buf.len(), HEADER + 2 * CHUNK * ITEM);

        assert!(ensure_capacity(&mut buf, KIND, HEADER, ITEM, 151, CHUNK));
        assert_eq!(item_capacity(buf.len(), HEADER, ITEM), 200);
    }

    #[test]
    fn offsets_follow_the_layout_formula() {
        let buf = ReportBuffer::with_len(KIND, HEADER + 4 * ITEM);
        let last = item_offset(HEADER, ITEM, 3);
        assert_eq!(last + ITEM, buf.len());
    }

    #[test]
    fn chunk_alignment_rounds_up() {
        assert_eq!(chunk_aligned(0, 50), 0);
        assert_eq!(chunk_aligned(1, 50), 50);
        assert_eq!(chunk_aligned(50, 50), 50);
        assert_eq!(chunk_aligned(51, 50), 100);
        assert_eq!(chunk_aligned(7, 0), 7);
    }

    #[test]
    fn kind_rejects_non_integer_tags() {
        assert_eq!(ReportBuffer::from_vec(vec![3.0, 1.0]).kind(), Some(3));
        assert_eq!(ReportBuffer::from_vec(vec![2.5]).kind(), None);
        assert_eq!(ReportBuffer::from_vec(vec![]).kind(), None);
    }
}
