//! Transform message encoding and decoding.
//!
//! Body layout, after the wire header: for each present quantity in wire
//! order (position, rotation, scale, velocity, angular velocity), one float
//! per synced axis in X, Y, Z order. Floats are half precision (2 bytes)
//! when the quantity is compressed, full precision (4 bytes) otherwise.
//! Rotation travels as Euler angles in degrees.

use bitstream::{BitReader, BitWriter, HALF_MAX};
use glam::Vec3;
use schema::{Quantity, QuantitySync, SyncConfig};
use wire::{FieldMask, MessageHeader, WireMessage};

use crate::error::{CodecError, CodecResult};
use crate::snapshot::{euler_degrees, from_euler_degrees, EntityState, Snapshot};
use crate::types::{EntityId, SyncIndex, Timestamp};

/// A fully decoded transform message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedMessage {
    pub entity: EntityId,
    pub sub_index: SyncIndex,
    /// Quantities that were actually on the wire.
    pub mask: FieldMask,
    pub snapshot: Snapshot,
}

/// Drops quantities the config never syncs.
#[must_use]
pub fn effective_mask(mask: FieldMask, config: &SyncConfig) -> FieldMask {
    Quantity::ALL
        .into_iter()
        .filter(|&q| mask.contains(q.bit()) && config.sync(q).is_enabled())
        .fold(FieldMask::EMPTY, |acc, q| acc.with(q.bit()))
}

/// Body length in bytes implied by `mask` under `config`.
#[must_use]
pub fn body_len(mask: FieldMask, config: &SyncConfig) -> usize {
    Quantity::ALL
        .into_iter()
        .filter(|&q| mask.contains(q.bit()))
        .map(|q| config.sync(q).encoded_len())
        .sum()
}

/// Encodes the quantities of `snapshot` selected by `mask`.
///
/// Quantities whose axis mask is empty are never written, whatever `mask`
/// says. Compressed axes saturate at the half-float range.
pub fn encode_message(
    entity: EntityId,
    sub_index: SyncIndex,
    snapshot: &Snapshot,
    mask: FieldMask,
    config: &SyncConfig,
    limits: &wire::Limits,
) -> CodecResult<Vec<u8>> {
    let mask = effective_mask(mask, config);
    let header = MessageHeader::new(
        mask,
        entity.raw(),
        sub_index.raw(),
        snapshot.timestamp.millis(),
    );
    let total = wire::header_len(&header) + body_len(mask, config);
    if total > limits.max_message_bytes {
        return Err(CodecError::Encode(wire::EncodeError::LimitsExceeded {
            kind: wire::LimitKind::MessageBytes,
            limit: limits.max_message_bytes,
            actual: total,
        }));
    }

    let mut writer = BitWriter::with_capacity(total);
    wire::encode_header(&mut writer, &header, limits)?;
    for quantity in Quantity::ALL {
        if !mask.contains(quantity.bit()) {
            continue;
        }
        let values = match quantity {
            Quantity::Position => snapshot.position,
            Quantity::Rotation => euler_degrees(snapshot.rotation),
            Quantity::Scale => snapshot.scale,
            Quantity::Velocity => snapshot.velocity,
            Quantity::AngularVelocity => snapshot.angular_velocity,
        };
        if !values.is_finite() {
            return Err(CodecError::NonFiniteValue { quantity });
        }
        if quantity == Quantity::Scale && has_negative_axis(values) {
            return Err(CodecError::NegativeScale);
        }
        write_axes(&mut writer, values, config.sync(quantity));
    }
    Ok(writer.finish())
}

/// Decodes the body of a framed message.
///
/// Quantities absent from the mask are taken from `fallback`, normally the
/// newest buffered snapshot or the live state. Present vector quantities
/// keep the fallback value on unsynced axes; rotation starts from zero
/// Euler angles instead, so a partial rotation mask only reproduces the
/// owner rotation when the unsynced axes are zero there too.
pub fn decode_snapshot(
    message: &WireMessage<'_>,
    config: &SyncConfig,
    fallback: &EntityState,
) -> CodecResult<(FieldMask, Snapshot)> {
    let mask = effective_mask(message.header.mask, config);
    let expected = body_len(mask, config);
    let declared = body_len(message.header.mask, config);
    if message.body.len() != expected || declared != expected {
        return Err(CodecError::PayloadLengthMismatch {
            expected,
            actual: message.body.len(),
        });
    }

    let mut reader = BitReader::new(message.body);
    let mut state = *fallback;
    for quantity in Quantity::ALL {
        if !mask.contains(quantity.bit()) {
            continue;
        }
        let sync = config.sync(quantity);
        match quantity {
            Quantity::Position => state.position = read_axes(&mut reader, sync, state.position)?,
            Quantity::Rotation => {
                let euler = read_axes(&mut reader, sync, Vec3::ZERO)?;
                if !euler.is_finite() {
                    return Err(CodecError::NonFiniteValue { quantity });
                }
                state.rotation = from_euler_degrees(euler);
            }
            Quantity::Scale => state.scale = read_axes(&mut reader, sync, state.scale)?,
            Quantity::Velocity => state.velocity = read_axes(&mut reader, sync, state.velocity)?,
            Quantity::AngularVelocity => {
                state.angular_velocity = read_axes(&mut reader, sync, state.angular_velocity)?;
            }
        }
    }

    let snapshot = Snapshot::from_state(Timestamp::from_millis(message.header.timestamp), &state);
    if let Some(quantity) = first_non_finite(&snapshot, mask) {
        return Err(CodecError::NonFiniteValue { quantity });
    }
    if mask.contains(FieldMask::SCALE) && has_negative_axis(snapshot.scale) {
        return Err(CodecError::NegativeScale);
    }
    Ok((mask, snapshot))
}

/// Frames and decodes a message in one step.
pub fn decode_message(
    bytes: &[u8],
    config: &SyncConfig,
    limits: &wire::Limits,
    fallback: &EntityState,
) -> CodecResult<DecodedMessage> {
    let message = wire::decode_message(bytes, limits)?;
    let (mask, snapshot) = decode_snapshot(&message, config, fallback)?;
    Ok(DecodedMessage {
        entity: EntityId::new(message.header.entity_id),
        sub_index: SyncIndex::new(message.header.sub_index),
        mask,
        snapshot,
    })
}

/// Checks that a peer's layout hash matches ours.
pub fn check_layout(config: &SyncConfig, peer_hash: u64) -> CodecResult<()> {
    let expected = schema::layout_hash(config);
    if expected != peer_hash {
        return Err(CodecError::LayoutMismatch {
            expected,
            found: peer_hash,
        });
    }
    Ok(())
}

fn write_axes(writer: &mut BitWriter, values: Vec3, sync: QuantitySync) {
    for axis in sync.axes.indices() {
        if sync.compressed {
            writer.write_f16(values[axis].clamp(-HALF_MAX, HALF_MAX));
        } else {
            writer.write_f32(values[axis]);
        }
    }
}

fn read_axes(reader: &mut BitReader<'_>, sync: QuantitySync, base: Vec3) -> CodecResult<Vec3> {
    let mut out = base;
    for axis in sync.axes.indices() {
        out[axis] = if sync.compressed {
            reader.read_f16()?
        } else {
            reader.read_f32()?
        };
    }
    Ok(out)
}

fn has_negative_axis(values: Vec3) -> bool {
    values.cmplt(Vec3::ZERO).any()
}

fn first_non_finite(snapshot: &Snapshot, mask: FieldMask) -> Option<Quantity> {
    Quantity::ALL.into_iter().find(|&q| {
        mask.contains(q.bit())
            && match q {
                Quantity::Position => !snapshot.position.is_finite(),
                Quantity::Rotation => !snapshot.rotation.is_finite(),
                Quantity::Scale => !snapshot.scale.is_finite(),
                Quantity::Velocity => !snapshot.velocity.is_finite(),
                Quantity::AngularVelocity => !snapshot.angular_velocity.is_finite(),
            }
    })
}
