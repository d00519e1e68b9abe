//! Error types for codec operations.

use std::fmt;

use schema::Quantity;

use crate::types::Timestamp;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding transform messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Wire framing error while decoding.
    Wire(wire::DecodeError),

    /// Wire framing error while encoding.
    Encode(wire::EncodeError),

    /// Bitstream error.
    Bitstream(bitstream::BitError),

    /// Body length does not match what the mask and config imply.
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// Peer uses a different axis/compression layout.
    LayoutMismatch { expected: u64, found: u64 },

    /// A value to encode, or a decoded value, is NaN or infinite.
    NonFiniteValue { quantity: Quantity },

    /// A scale axis is negative.
    NegativeScale,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(err) => write!(f, "wire error: {err}"),
            Self::Encode(err) => write!(f, "wire encode error: {err}"),
            Self::Bitstream(err) => write!(f, "bitstream error: {err}"),
            Self::PayloadLengthMismatch { expected, actual } => {
                write!(
                    f,
                    "payload length mismatch: expected {expected} bytes, found {actual}"
                )
            }
            Self::LayoutMismatch { expected, found } => {
                write!(
                    f,
                    "layout hash mismatch: expected 0x{expected:016X}, found 0x{found:016X}"
                )
            }
            Self::NonFiniteValue { quantity } => {
                write!(f, "non-finite value in {quantity}")
            }
            Self::NegativeScale => write!(f, "negative scale axis"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Bitstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<wire::DecodeError> for CodecError {
    fn from(err: wire::DecodeError) -> Self {
        Self::Wire(err)
    }
}

impl From<wire::EncodeError> for CodecError {
    fn from(err: wire::EncodeError) -> Self {
        Self::Encode(err)
    }
}

impl From<bitstream::BitError> for CodecError {
    fn from(err: bitstream::BitError) -> Self {
        Self::Bitstream(err)
    }
}

/// History rejected a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    /// Older than the newest buffered snapshot.
    OutOfOrder {
        newest: Timestamp,
        received: Timestamp,
    },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder { newest, received } => write!(
                f,
                "snapshot at {} ms is older than newest buffered {} ms",
                received.millis(),
                newest.millis()
            ),
        }
    }
}

impl std::error::Error for HistoryError {}
