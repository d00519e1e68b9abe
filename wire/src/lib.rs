//! Message framing for the tsync transform codec.
//!
//! This crate handles the binary header of a transform message: the
//! field-presence mask, the routing ids and the owner timestamp. It does not
//! know how the body is laid out; that depends on the sync configuration
//! shared by both ends and lives in the codec.
//!
//! # Design Principles
//!
//! - **Compact framing** - Ids and timestamps are LEB128 varints.
//! - **Bounded decoding** - Sizes and indices are validated against limits.
//! - **No domain knowledge** - This crate handles framing, not transforms.

mod error;
mod header;
mod kind;
mod limits;
mod message;

pub use error::{DecodeError, EncodeError, LimitKind, WireResult};
pub use header::{FieldMask, MessageHeader, MAX_HEADER_SIZE, MIN_HEADER_SIZE};
pub use kind::{Channel, MessageKind};
pub use limits::Limits;
pub use message::{decode_message, encode_header, header_len, peek_target, WireMessage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = MAX_HEADER_SIZE;
        let _ = FieldMask::ALL;
        let _ = MessageHeader::new(FieldMask::EMPTY, 0, 0, 0);
        let _ = Limits::default();
        let _ = MessageKind::OwnerToServer;
        let _ = Channel::Unreliable;

        let _: WireResult<()> = Ok(());
    }

    #[test]
    fn max_header_fits_default_limits() {
        assert!(MAX_HEADER_SIZE < Limits::default().max_message_bytes);
    }
}
