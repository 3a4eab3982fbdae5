//! Read cursor over a borrowed payload buffer.
//!
//! Both list decoders walk their payload through a [`Cursor`]. Every read
//! either advances the position or leaves it untouched and returns `None`, so
//! a failed read never desynchronizes the caller.
//!
//! # Resynchronization
//!
//! [`Cursor::framed`] is the skip-by-declared-length primitive. It reads a
//! 4-byte length `L`, checks that `L` bytes are present, and moves past them
//! before the caller looks at the content. Whether the content then parses or
//! not, the cursor already sits on the next entry boundary.

use bytes::Buf;

/// Size of the little-endian length prefix used by [`Cursor::framed`].
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Reasons a length-prefixed region could not be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than [`LENGTH_PREFIX_SIZE`] bytes remain
    TruncatedPrefix {
        /// Bytes remaining at the prefix position
        remaining: usize,
    },
    /// The prefix declares more bytes than remain after it
    LengthExceedsBuffer {
        /// Length from the prefix
        declared: u32,
        /// Bytes remaining after the prefix
        remaining: usize,
    },
}

/// Forward-only read position over a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Take the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let region = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(region)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Option<u32> {
        let mut bytes = self.take(4)?;
        Some(bytes.get_u32_le())
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> Option<u64> {
        let mut bytes = self.take(8)?;
        Some(bytes.get_u64_le())
    }

    /// Move the cursor to `tail`, a suffix of [`Cursor::rest`].
    ///
    /// Used after a sub-decoder that reports what it left unconsumed. Returns
    /// the number of bytes skipped, or `None` (without moving) if `tail` is
    /// not a suffix of the unread bytes.
    pub fn advance_to(&mut self, tail: &'a [u8]) -> Option<usize> {
        let rest = self.rest();
        let consumed = rest.len().checked_sub(tail.len())?;
        if !tail.is_empty() && rest[consumed..].as_ptr() != tail.as_ptr() {
            return None;
        }
        self.pos += consumed;
        Some(consumed)
    }

    /// Take a region framed by a 4-byte little-endian length prefix.
    ///
    /// On success the cursor sits just past the region, regardless of what
    /// the caller later makes of its content. On error the cursor does not
    /// move.
    pub fn framed(&mut self) -> Result<&'a [u8], FrameError> {
        let mut probe = *self;
        let declared =
            probe.read_u32().ok_or(FrameError::TruncatedPrefix { remaining: self.remaining() })?;
        let region = probe.take(declared as usize).ok_or(FrameError::LengthExceedsBuffer {
            declared,
            remaining: probe.remaining(),
        })?;

        *self = probe;
        Ok(region)
    }
}
