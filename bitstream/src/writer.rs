//! Byte-aligned writer for encoding packed binary data.

use crate::half::f32_to_half_bits;

/// Maximum encoded length of a `u32` varint.
pub const VARU32_MAX_BYTES: usize = 5;

/// A writer backed by a growable buffer.
///
/// Every value starts on a byte boundary. Multi-byte integers and floats are
/// little-endian. Call [`finish`](Self::finish) to take the bytes.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an IEEE-754 binary32 float.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes a half-precision float (2 bytes).
    pub fn write_f16(&mut self, value: f32) {
        self.write_u16(f32_to_half_bits(value));
    }

    /// Writes a LEB128 varint `u32`.
    pub fn write_varu32(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Returns the encoded length of a varint `u32`.
#[must_use]
pub const fn varu32_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x001F_FFFF => 3,
        0x0020_0000..=0x0FFF_FFFF => 4,
        _ => VARU32_MAX_BYTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writer() {
        let writer = BitWriter::new();
        assert_eq!(writer.byte_len(), 0);
        assert!(writer.finish().is_empty());
    }

    #[test]
    fn integers_are_little_endian() {
        let mut writer = BitWriter::new();
        writer.write_u8(0xAB);
        writer.write_u16(0xBEEF);
        writer.write_u32(0x1234_5678);
        assert_eq!(writer.byte_len(), 7);
        assert_eq!(
            writer.finish(),
            vec![0xAB, 0xEF, 0xBE, 0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn floats_full_and_half() {
        let mut writer = BitWriter::new();
        writer.write_f32(1.0);
        writer.write_f16(1.0);
        assert_eq!(writer.finish(), vec![0x00, 0x00, 0x80, 0x3F, 0x00, 0x3C]);
    }

    #[test]
    fn varint_encoding() {
        let mut writer = BitWriter::new();
        writer.write_varu32(300);
        writer.write_varu32(0);
        assert_eq!(writer.finish(), vec![0xAC, 0x02, 0x00]);
    }

    #[test]
    fn varint_len_matches_encoding() {
        for value in [0u32, 0x7F, 0x80, 0x3FFF, 0x4000, 0x0FFF_FFFF, u32::MAX] {
            let mut writer = BitWriter::new();
            writer.write_varu32(value);
            assert_eq!(writer.finish().len(), varu32_len(value), "value {value}");
        }
    }
}
