//! Byte-aligned reader with bounded operations.

use crate::error::{BitError, BitResult};
use crate::half::half_bits_to_f32;
use crate::writer::VARU32_MAX_BYTES;

/// A reader for decoding packed binary data.
///
/// All read operations are bounds-checked and return errors on failure.
/// A failed read consumes nothing. The reader never panics on malformed
/// input.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bytes remaining to read.
    #[must_use]
    pub const fn bytes_remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes_remaining() == 0
    }

    /// Returns the current byte position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the unread tail.
    #[must_use]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    pub fn read_u8(&mut self) -> BitResult<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> BitResult<u16> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> BitResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    /// Reads an IEEE-754 binary32 float.
    pub fn read_f32(&mut self) -> BitResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads a half-precision float and widens it to `f32`.
    pub fn read_f16(&mut self) -> BitResult<f32> {
        Ok(half_bits_to_f32(self.read_u16()?))
    }

    /// Reads a LEB128 varint `u32`.
    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let start = self.pos;
        let mut value = 0u32;
        for i in 0..VARU32_MAX_BYTES {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.pos = start;
                    return Err(err);
                }
            };
            let payload = u32::from(byte & 0x7F);
            if i == VARU32_MAX_BYTES - 1 && payload > 0x0F {
                self.pos = start;
                return Err(BitError::InvalidVarint);
            }
            value |= payload << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        self.pos = start;
        Err(BitError::InvalidVarint)
    }

    fn read_array<const N: usize>(&mut self) -> BitResult<[u8; N]> {
        let available = self.bytes_remaining();
        if N > available {
            return Err(BitError::UnexpectedEof {
                requested: N,
                available,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}
