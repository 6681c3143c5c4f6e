//! Byte Cursors
//!
//! Position-tracked writers and readers over byte buffers. A [`ByteWriter`]
//! owns a fixed-capacity buffer that only grows when asked to; writes past the
//! end fail instead of reallocating, so a caller can size a scratch buffer once
//! and reuse it for every packet. A [`ByteReader`] borrows its input and fails
//! when fewer bytes remain than a read requires.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Byte order used for multi-byte integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Network byte order
    #[default]
    Big,
    Little,
}

/// Cursor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("Buffer too short: need {needed} bytes, {available} available")]
    BufferTooShort { needed: usize, available: usize },

    #[error("Insufficient bytes: need {needed} bytes, {available} remaining")]
    InsufficientBytes { needed: usize, available: usize },
}

/// Write cursor over an owned, fixed-capacity buffer
#[derive(Debug, Clone)]
pub struct ByteWriter {
    data: Vec<u8>,
    position: usize,
    endianness: Endianness,
}

impl ByteWriter {
    /// Create a zeroed writer of `size` bytes using big-endian integers
    pub fn with_size(size: usize) -> Self {
        Self::with_endianness(size, Endianness::Big)
    }

    /// Create a zeroed writer with a default byte order
    pub fn with_endianness(size: usize, endianness: Endianness) -> Self {
        ByteWriter {
            data: vec![0u8; size],
            position: 0,
            endianness,
        }
    }

    /// Total capacity of the underlying buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current write position
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes that can still be written
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Rewind to the start without touching the contents
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Rewind to the start and zero the buffer
    pub fn clear(&mut self) {
        self.position = 0;
        self.data.fill(0);
    }

    /// Move the write position. Data after the new position may be overwritten.
    pub fn set_position(&mut self, position: usize) -> Result<(), CursorError> {
        if position > self.data.len() {
            return Err(CursorError::BufferTooShort {
                needed: position,
                available: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Bytes written so far
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.data[..self.position]
    }

    /// The whole underlying buffer, including bytes past the write position
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the bytes written so far
    pub fn to_vec(&self) -> Vec<u8> {
        self.written().to_vec()
    }

    /// Ensure room for `additional` more bytes after the current position.
    ///
    /// Returns true if the buffer had to grow.
    pub fn grow(&mut self, additional: usize) -> bool {
        self.resize(self.position + additional)
    }

    /// Grow the buffer to `new_len` bytes. Never shrinks.
    ///
    /// Returns true if the buffer was resized.
    pub fn resize(&mut self, new_len: usize) -> bool {
        if new_len > self.data.len() {
            self.data.resize(new_len, 0);
            true
        } else {
            false
        }
    }

    fn require(&self, needed: usize) -> Result<(), CursorError> {
        if self.remaining() < needed {
            return Err(CursorError::BufferTooShort {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<&mut Self, CursorError> {
        self.require(1)?;
        self.data[self.position] = value;
        self.position += 1;
        Ok(self)
    }

    /// Write a 16-bit integer in the writer's default byte order
    pub fn write_u16(&mut self, value: u16) -> Result<&mut Self, CursorError> {
        self.write_u16_with(value, self.endianness)
    }

    /// Write a 16-bit integer in the given byte order
    pub fn write_u16_with(
        &mut self,
        value: u16,
        endianness: Endianness,
    ) -> Result<&mut Self, CursorError> {
        self.require(2)?;
        let mut dst = &mut self.data[self.position..];
        match endianness {
            Endianness::Big => dst.put_u16(value),
            Endianness::Little => dst.put_u16_le(value),
        }
        self.position += 2;
        Ok(self)
    }

    /// Write a 32-bit integer in the writer's default byte order
    pub fn write_u32(&mut self, value: u32) -> Result<&mut Self, CursorError> {
        self.write_u32_with(value, self.endianness)
    }

    /// Write a 32-bit integer in the given byte order
    pub fn write_u32_with(
        &mut self,
        value: u32,
        endianness: Endianness,
    ) -> Result<&mut Self, CursorError> {
        self.require(4)?;
        let mut dst = &mut self.data[self.position..];
        match endianness {
            Endianness::Big => dst.put_u32(value),
            Endianness::Little => dst.put_u32_le(value),
        }
        self.position += 4;
        Ok(self)
    }

    /// Copy a slice into the buffer
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CursorError> {
        self.require(bytes.len())?;
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(self)
    }

    /// Write `count` zero bytes
    pub fn write_zeros(&mut self, count: usize) -> Result<&mut Self, CursorError> {
        self.require(count)?;
        self.data[self.position..self.position + count].fill(0);
        self.position += count;
        Ok(self)
    }
}

/// Read cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, position: 0 }
    }

    /// Current read position
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// The complete input slice
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn require(&self, needed: usize) -> Result<(), CursorError> {
        if self.remaining() < needed {
            return Err(CursorError::InsufficientBytes {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        self.require(1)?;
        let value = self.data[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        self.require(2)?;
        let value = (&self.data[self.position..]).get_u16();
        self.position += 2;
        Ok(value)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CursorError> {
        self.require(2)?;
        let value = (&self.data[self.position..]).get_u16_le();
        self.position += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        self.require(4)?;
        let value = (&self.data[self.position..]).get_u32();
        self.position += 4;
        Ok(value)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CursorError> {
        self.require(4)?;
        let value = (&self.data[self.position..]).get_u32_le();
        self.position += 4;
        Ok(value)
    }

    /// Read exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        self.require(n)?;
        let bytes = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(bytes)
    }

    /// Read everything that is left
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.position..];
        self.position = self.data.len();
        bytes
    }
}
