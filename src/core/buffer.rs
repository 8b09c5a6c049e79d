//! # Byte Buffer
//!
//! Growable byte container with independent read and write cursors.
//!
//! All framing and payload (de)serialization is built on this type. A session
//! owns exactly one receive `ByteBuffer`; bytes are appended by read events
//! and consumed by the extraction loop, with partial frames surviving in
//! place between reads.
//!
//! ## Invariant
//! `0 <= read_pos <= write length <= capacity`. The buffer grows on writes
//! past capacity and never shrinks implicitly; `compact()` reclaims consumed
//! bytes explicitly once a drain pass finishes.
//!
//! ## Contract
//! `read_i32`/`read_bytes` fail with [`ProtocolError::BufferUnderflow`] when
//! fewer bytes remain unread than requested — never a silent short read.
//!
//! Not concurrency-safe: each instance is confined to its owning session's
//! read task.

use crate::error::{ProtocolError, Result};

/// Compact only once this many consumed bytes have accumulated, so small
/// drains do not pay a memmove each time.
const COMPACT_THRESHOLD: usize = 4 * 1024;

/// Growable byte buffer with a read cursor.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl ByteBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Append raw bytes at the write cursor, growing if needed.
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a big-endian i32 at the write cursor.
    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Consume and return the next big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Consume and return the next `n` unread bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::BufferUnderflow {
                requested: n,
                available: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..self.read_pos])
    }

    /// Inspect a big-endian i32 at `offset` bytes past the read cursor
    /// without consuming anything. Returns `None` if not enough is buffered.
    pub fn peek_i32(&self, offset: usize) -> Option<i32> {
        let start = self.read_pos.checked_add(offset)?;
        let end = start.checked_add(4)?;
        if end > self.data.len() {
            return None;
        }
        let bytes = &self.data[start..end];
        Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Advance the read cursor past `n` bytes without returning them.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(ProtocolError::BufferUnderflow {
                requested: n,
                available: self.remaining(),
            });
        }
        self.read_pos += n;
        Ok(())
    }

    /// Number of unread bytes between the read cursor and the write length.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Total written length, consumed bytes included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no unread bytes remain.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// View of the unread region.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    /// Reclaim consumed bytes by shifting the unread region to the front.
    ///
    /// Cheap no-op until enough consumed bytes accumulate; capacity is kept
    /// so steady-state traffic does not reallocate per frame.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        if self.read_pos == self.data.len() {
            self.data.clear();
            self.read_pos = 0;
        } else if self.read_pos >= COMPACT_THRESHOLD {
            self.data.drain(..self.read_pos);
            self.read_pos = 0;
        }
    }

    /// Drop all content and reset both cursors. Capacity is retained.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }
}
