//! Message header encoding and decoding.

use bitstream::{varu32_len, BitReader, BitWriter};

use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::header::{FieldMask, MessageHeader, MIN_HEADER_SIZE};
use crate::limits::Limits;

/// A decoded wire message: header plus the undecoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireMessage<'a> {
    pub header: MessageHeader,
    pub body: &'a [u8],
}

/// Returns the encoded size of a header in bytes.
#[must_use]
pub const fn header_len(header: &MessageHeader) -> usize {
    1 + varu32_len(header.entity_id) + varu32_len(header.sub_index) + varu32_len(header.timestamp)
}

/// Writes a message header into `writer`.
pub fn encode_header(
    writer: &mut BitWriter,
    header: &MessageHeader,
    limits: &Limits,
) -> Result<(), EncodeError> {
    if !header.mask.is_valid() {
        return Err(EncodeError::InvalidMask {
            mask: header.mask.raw(),
        });
    }
    if header.sub_index > limits.max_sub_index {
        return Err(EncodeError::LimitsExceeded {
            kind: LimitKind::SubIndex,
            limit: limits.max_sub_index as usize,
            actual: header.sub_index as usize,
        });
    }
    writer.write_u8(header.mask.raw());
    writer.write_varu32(header.entity_id);
    writer.write_varu32(header.sub_index);
    writer.write_varu32(header.timestamp);
    Ok(())
}

/// Decodes a message into its header and body slice.
pub fn decode_message<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<WireMessage<'a>> {
    if buf.len() < MIN_HEADER_SIZE {
        return Err(DecodeError::MessageTooSmall {
            actual: buf.len(),
            required: MIN_HEADER_SIZE,
        });
    }
    if buf.len() > limits.max_message_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::MessageBytes,
            limit: limits.max_message_bytes,
            actual: buf.len(),
        });
    }

    let mut reader = BitReader::new(buf);
    let mask = FieldMask::from_raw(reader.read_u8()?);
    if !mask.is_valid() {
        return Err(DecodeError::InvalidMask { mask: mask.raw() });
    }
    let entity_id = reader.read_varu32()?;
    let sub_index = reader.read_varu32()?;
    if sub_index > limits.max_sub_index {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::SubIndex,
            limit: limits.max_sub_index as usize,
            actual: sub_index as usize,
        });
    }
    let timestamp = reader.read_varu32()?;
    let body = reader.remaining_bytes();

    Ok(WireMessage {
        header: MessageHeader {
            mask,
            entity_id,
            sub_index,
            timestamp,
        },
        body,
    })
}

/// Reads only the routing part of a message (entity id and sub-object index).
///
/// Used by dispatchers that need to locate the target before decoding.
pub fn peek_target(buf: &[u8], limits: &Limits) -> WireResult<(u32, u32)> {
    let message = decode_message(buf, limits)?;
    Ok((message.header.entity_id, message.header.sub_index))
}
