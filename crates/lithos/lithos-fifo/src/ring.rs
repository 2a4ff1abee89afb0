//! Fixed-capacity byte ring used as the per-handle FIFO.
//!
//! Every open handle owns one `RingBuffer`. The ring never grows and never
//! overwrites unread bytes: `append` stops when the ring is full and
//! `consume` stops when it is empty. Both are O(n) in bytes moved.
//!
//! # Layout
//!
//! ```text
//! capacity = 8, read_cursor = 6, len = 4
//!
//!   index:   0   1   2   3   4   5   6   7
//!          ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!          │ c │ d │   │   │   │   │ a │ b │
//!          └───┴───┴───┴───┴───┴───┴───┴───┘
//!                    ▲                   ▲
//!               write_cursor        read_cursor
//!
//! write_cursor == (read_cursor + len) % capacity
//! ```
//!
//! The cursors coincide both when the ring is empty and when it is full, so
//! `len` alone tells the two states apart.

use std::collections::TryReserveError;

/// Number of bytes each handle can hold.
pub const FIFO_CAPACITY: usize = 64;

/// A fixed-capacity circular byte buffer with independent read and write cursors.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    /// Backing storage, always exactly `FIFO_CAPACITY` bytes.
    data: Box<[u8]>,
    /// Index of the next byte to write.
    write_cursor: usize,
    /// Index of the oldest unread byte.
    read_cursor: usize,
    /// Number of unread bytes.
    len: usize,
}

impl RingBuffer {
    /// Creates an empty ring, aborting on allocation failure like any `Vec`.
    pub fn new() -> Self {
        Self::from_storage(vec![0u8; FIFO_CAPACITY].into_boxed_slice())
    }

    /// Creates an empty ring, reporting allocation failure instead of aborting.
    ///
    /// The device uses this at open time so that an allocation failure turns into
    /// [`FifoError::OutOfMemory`](crate::FifoError::OutOfMemory).
    pub fn try_new() -> Result<Self, TryReserveError> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(FIFO_CAPACITY)?;
        storage.resize(FIFO_CAPACITY, 0);
        Ok(Self::from_storage(storage.into_boxed_slice()))
    }

    fn from_storage(data: Box<[u8]>) -> Self {
        debug_assert_eq!(data.len(), FIFO_CAPACITY);
        Self {
            data,
            write_cursor: 0,
            read_cursor: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        FIFO_CAPACITY
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of bytes that can still be appended.
    #[inline]
    pub fn free(&self) -> usize {
        FIFO_CAPACITY - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == FIFO_CAPACITY
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Appends as many leading bytes of `bytes` as fit.
    ///
    /// Copies `min(bytes.len(), free())` bytes starting at the write cursor,
    /// wrapping at the end of the storage, and returns that count. A full ring
    /// appends nothing and returns 0.
    ///
    /// # Example
    /// ```
    /// use lithos_fifo::{RingBuffer, FIFO_CAPACITY};
    /// let mut ring = RingBuffer::new();
    /// assert_eq!(ring.append(b"abc"), 3);
    /// assert_eq!(ring.append(&[0u8; FIFO_CAPACITY]), FIFO_CAPACITY - 3);
    /// assert!(ring.is_full());
    /// ```
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.free());

        // At most two contiguous runs: up to the end of storage, then from 0.
        let first = count.min(FIFO_CAPACITY - self.write_cursor);
        self.data[self.write_cursor..self.write_cursor + first].copy_from_slice(&bytes[..first]);
        self.data[..count - first].copy_from_slice(&bytes[first..count]);

        self.write_cursor = (self.write_cursor + count) % FIFO_CAPACITY;
        self.len += count;
        count
    }

    /// Removes up to `dst.len()` bytes in FIFO order into `dst`.
    ///
    /// Returns the number of bytes moved, `min(dst.len(), len())`.
    pub fn consume_into(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.len);

        let first = count.min(FIFO_CAPACITY - self.read_cursor);
        dst[..first].copy_from_slice(&self.data[self.read_cursor..self.read_cursor + first]);
        dst[first..count].copy_from_slice(&self.data[..count - first]);

        self.read_cursor = (self.read_cursor + count) % FIFO_CAPACITY;
        self.len -= count;
        count
    }

    /// Removes up to `max_count` bytes and returns them in FIFO order.
    pub fn consume(&mut self, max_count: usize) -> Vec<u8> {
        let mut out = vec![0u8; max_count.min(self.len)];
        let n = self.consume_into(&mut out);
        debug_assert_eq!(n, out.len());
        out
    }

    /// Raw view of the backing storage, indexed by absolute position.
    pub fn storage(&self) -> &[u8] {
        &self.data
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(ring: &RingBuffer) {
        assert!(ring.len() <= FIFO_CAPACITY);
        assert_eq!(
            ring.write_cursor(),
            (ring.read_cursor() + ring.len()) % FIFO_CAPACITY,
            "cursor invariant broken: {ring:?}"
        );
    }

    /// Moves both cursors to `pos` by pushing and draining filler bytes.
    fn ring_at(pos: usize) -> RingBuffer {
        let mut ring = RingBuffer::new();
        ring.append(&vec![0xAA; pos]);
        ring.consume(pos);
        ring
    }

    #[test]
    fn new_ring_is_zeroed() {
        let ring = RingBuffer::try_new().unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.read_cursor(), 0);
        assert_eq!(ring.write_cursor(), 0);
        assert_eq!(ring.capacity(), FIFO_CAPACITY);
        assert!(ring.storage().iter().all(|&b| b == 0));
    }

    #[test]
    fn append_then_consume_preserves_order() {
        let mut ring = RingBuffer::new();
        assert_eq!(ring.append(b"simple char"), 11);
        assert_eq!(ring.len(), 11);
        assert_eq!(ring.consume(5), b"simpl");
        assert_eq!(ring.consume(100), b"e char");
        assert!(ring.is_empty());
        assert_invariant(&ring);
    }

    #[test]
    fn double_append_is_contiguous() {
        let mut ring = RingBuffer::new();
        ring.append(b"simple char");
        ring.append(b"simple char");
        assert_eq!(&ring.storage()[..22], b"simple charsimple char");
        assert_eq!(ring.len(), 22);
        assert_eq!(ring.read_cursor(), 0);
        assert_eq!(ring.write_cursor(), 22);
    }

    #[test]
    fn append_wraps_at_end_of_storage() {
        let mut ring = ring_at(FIFO_CAPACITY - 4);
        assert_eq!(ring.append(b"simple char"), 11);

        assert_eq!(&ring.storage()[60..64], b"simp");
        assert_eq!(&ring.storage()[0..7], b"le char");
        assert_eq!(ring.write_cursor(), 7);
        assert_eq!(ring.read_cursor(), 60);
        assert_invariant(&ring);

        assert_eq!(ring.consume(11), b"simple char");
        assert!(ring.is_empty());
        assert_eq!(ring.read_cursor(), 7);
    }

    #[test]
    fn full_ring_appends_nothing() {
        let mut ring = RingBuffer::new();
        assert_eq!(ring.append(&[1u8; 100]), FIFO_CAPACITY);
        assert!(ring.is_full());
        // Cursors coincide when full.
        assert_eq!(ring.read_cursor(), ring.write_cursor());
        assert_eq!(ring.append(b"x"), 0);
        assert_eq!(ring.len(), FIFO_CAPACITY);
    }

    #[test]
    fn partial_append_fills_remaining_space() {
        let mut ring = RingBuffer::new();
        ring.append(&[0u8; FIFO_CAPACITY - 4]);
        assert_eq!(ring.append(b"simple char"), 4);
        assert!(ring.is_full());
        ring.consume(FIFO_CAPACITY - 4);
        assert_eq!(ring.consume(64), b"simp");
    }

    #[test]
    fn consume_on_empty_returns_nothing() {
        let mut ring = ring_at(13);
        assert!(ring.consume(42).is_empty());
        let mut dst = [0u8; 4];
        assert_eq!(ring.consume_into(&mut dst), 0);
        assert_eq!(ring.read_cursor(), 13);
    }

    #[test]
    fn invariant_holds_over_mixed_sequence() {
        let mut ring = RingBuffer::new();
        let mut expected = std::collections::VecDeque::new();
        let mut next = 0u8;

        // Deterministic pseudo-random walk of appends and consumes.
        let mut state = 0x2545_f491u32;
        for _ in 0..2_000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let n = (state % 40) as usize;

            if state & 1 == 0 {
                let chunk: Vec<u8> = (0..n)
                    .map(|_| {
                        next = next.wrapping_add(1);
                        next
                    })
                    .collect();
                let appended = ring.append(&chunk);
                assert_eq!(appended, n.min(FIFO_CAPACITY - expected.len()));
                expected.extend(&chunk[..appended]);
            } else {
                let got = ring.consume(n);
                let want: Vec<u8> = expected.drain(..n.min(expected.len())).collect();
                assert_eq!(got, want);
            }
            assert_eq!(ring.len(), expected.len());
            assert_invariant(&ring);
        }
    }
}
