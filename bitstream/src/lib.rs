//! Low-level packing primitives for the tsync transform codec.
//!
//! This crate provides [`BitWriter`] and [`BitReader`] for byte-aligned
//! little-endian integers, floats and LEB128 varints, plus IEEE-754
//! half-float conversion used by compressed transform fields.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about entities or transforms.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_u8(7);
//! writer.write_varu32(300);
//! writer.write_f16(0.5);
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_u8().unwrap(), 7);
//! assert_eq!(reader.read_varu32().unwrap(), 300);
//! assert_eq!(reader.read_f16().unwrap(), 0.5);
//! ```

mod error;
mod half;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use half::{f32_to_half_bits, half_bits_to_f32, quantize_half, HALF_MAX};
pub use reader::BitReader;
pub use writer::{varu32_len, BitWriter, VARU32_MAX_BYTES};
