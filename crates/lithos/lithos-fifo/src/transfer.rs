//! Byte transfer across the caller's trust boundary.
//!
//! The device never touches caller memory directly. A write pulls bytes in
//! through a [`UserSource`] and a read pushes bytes out through a [`UserSink`].
//! Both transfers are all-or-nothing: either every requested byte moves or the
//! call fails with [`CopyFault`] and the destination is left as it was.

use crate::error::CopyFault;

/// Caller-owned bytes offered to a write.
pub trait UserSource {
    /// Number of bytes the caller asked to write.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the first `dst.len()` bytes of the source into `dst`.
    ///
    /// `dst.len()` never exceeds [`len`](Self::len).
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), CopyFault>;
}

/// Caller-owned space offered to a read.
pub trait UserSink {
    /// Maximum number of bytes the caller can take.
    fn capacity(&self) -> usize;

    /// Copies all of `src` to the start of the sink.
    ///
    /// `src.len()` never exceeds [`capacity`](Self::capacity).
    fn copy_out(&mut self, src: &[u8]) -> Result<(), CopyFault>;
}

impl UserSource for [u8] {
    #[inline]
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    #[inline]
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        let src = self.get(..dst.len()).ok_or(CopyFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl<const N: usize> UserSource for [u8; N] {
    #[inline]
    fn len(&self) -> usize {
        N
    }

    #[inline]
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        self.as_slice().copy_in(dst)
    }
}

impl UserSource for Vec<u8> {
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        self.as_slice().copy_in(dst)
    }
}

impl UserSource for str {
    #[inline]
    fn len(&self) -> usize {
        str::len(self)
    }

    #[inline]
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        self.as_bytes().copy_in(dst)
    }
}

impl UserSink for [u8] {
    #[inline]
    fn capacity(&self) -> usize {
        self.len()
    }

    #[inline]
    fn copy_out(&mut self, src: &[u8]) -> Result<(), CopyFault> {
        let dst = self.get_mut(..src.len()).ok_or(CopyFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl<const N: usize> UserSink for [u8; N] {
    #[inline]
    fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn copy_out(&mut self, src: &[u8]) -> Result<(), CopyFault> {
        self.as_mut_slice().copy_out(src)
    }
}

/// Growable sink that accepts up to `limit` bytes, used by
/// [`FifoFile::read_to_vec`](crate::FifoFile::read_to_vec).
#[derive(Debug)]
pub(crate) struct VecSink {
    pub(crate) buf: Vec<u8>,
    limit: usize,
}

impl VecSink {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }
}

impl UserSink for VecSink {
    fn capacity(&self) -> usize {
        self.limit
    }

    fn copy_out(&mut self, src: &[u8]) -> Result<(), CopyFault> {
        if src.len() > self.limit {
            return Err(CopyFault);
        }
        self.buf.clear();
        self.buf.extend_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_copies_prefix() {
        let src: &[u8] = b"simple char";
        let mut dst = [0u8; 4];
        src.copy_in(&mut dst).unwrap();
        assert_eq!(&dst, b"simp");
    }

    #[test]
    fn slice_source_rejects_overlong_request() {
        let src: &[u8] = b"ab";
        let mut dst = [7u8; 3];
        assert_eq!(src.copy_in(&mut dst), Err(CopyFault));
        assert_eq!(dst, [7u8; 3]);
    }

    #[test]
    fn slice_sink_leaves_tail_untouched() {
        let mut dst = [b'.'; 6];
        dst.copy_out(b"abc").unwrap();
        assert_eq!(&dst, b"abc...");
        assert_eq!(dst.copy_out(b"too long!"), Err(CopyFault));
    }
}
