//! Introspection and debugging tools for tsync transform messages.
//!
//! This crate provides utilities for inspecting captured messages:
//!
//! - Print the header (presence mask, routing ids, owner timestamp)
//! - Explain the body size per quantity under a sync config
//! - Decode a message into structured JSON
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Human-readable output** - Make it easy to understand what the codec is doing.

use std::fmt::Write as _;

use codec::{body_len, euler_degrees, CodecResult, EntityState};
use schema::{layout_hash, Quantity, SyncConfig};
use serde::Serialize;
use wire::{FieldMask, Limits};

/// Header fields of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderReport {
    pub mask: u8,
    /// Quantities flagged present, in wire order.
    pub quantities: Vec<&'static str>,
    pub entity_id: u32,
    pub sub_index: u32,
    pub timestamp_ms: u32,
    pub header_len: usize,
}

/// How one present quantity is laid out in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantityLayout {
    pub name: &'static str,
    pub axes: String,
    pub compressed: bool,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub total_len: usize,
    pub header: HeaderReport,
    pub body_len: usize,
    /// Only known when a config is supplied.
    pub expected_body_len: Option<usize>,
    pub layout_hash: Option<String>,
    pub layout: Vec<QuantityLayout>,
}

/// Reads the header of `bytes` and, given a config, checks the body size.
///
/// Without a config only the framing is validated.
pub fn inspect_message(
    bytes: &[u8],
    config: Option<&SyncConfig>,
    limits: &Limits,
) -> CodecResult<InspectReport> {
    let message = wire::decode_message(bytes, limits)?;
    let header = message.header;
    let present: Vec<Quantity> = Quantity::ALL
        .into_iter()
        .filter(|q| header.mask.contains(q.bit()))
        .collect();

    let layout = config
        .map(|config| {
            present
                .iter()
                .map(|&q| {
                    let sync = config.sync(q);
                    QuantityLayout {
                        name: q.name(),
                        axes: sync.axes.to_string(),
                        compressed: sync.compressed,
                        bytes: sync.encoded_len(),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(InspectReport {
        total_len: bytes.len(),
        header: HeaderReport {
            mask: header.mask.raw(),
            quantities: mask_names(header.mask),
            entity_id: header.entity_id,
            sub_index: header.sub_index,
            timestamp_ms: header.timestamp,
            header_len: wire::header_len(&header),
        },
        body_len: message.body.len(),
        expected_body_len: config.map(|config| body_len(header.mask, config)),
        layout_hash: config.map(|config| format!("0x{:016x}", layout_hash(config))),
        layout,
    })
}

/// One decoded quantity. Rotation is shown as Euler degrees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedField {
    pub name: &'static str,
    pub value: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeOutput {
    pub entity_id: u32,
    pub sub_index: u32,
    pub timestamp_ms: u32,
    pub fields: Vec<DecodedField>,
}

/// Decodes a message against `config`. Omitted quantities are not listed.
pub fn decode_message_json(
    bytes: &[u8],
    config: &SyncConfig,
    limits: &Limits,
) -> CodecResult<DecodeOutput> {
    let decoded = codec::decode_message(bytes, config, limits, &EntityState::default())?;
    let snapshot = decoded.snapshot;
    let fields = Quantity::ALL
        .into_iter()
        .filter(|q| decoded.mask.contains(q.bit()))
        .map(|q| {
            let value = match q {
                Quantity::Position => snapshot.position,
                Quantity::Rotation => euler_degrees(snapshot.rotation),
                Quantity::Scale => snapshot.scale,
                Quantity::Velocity => snapshot.velocity,
                Quantity::AngularVelocity => snapshot.angular_velocity,
            };
            DecodedField {
                name: q.name(),
                value: value.to_array(),
            }
        })
        .collect();
    Ok(DecodeOutput {
        entity_id: decoded.entity.raw(),
        sub_index: decoded.sub_index.raw(),
        timestamp_ms: snapshot.timestamp.millis(),
        fields,
    })
}

#[must_use]
pub fn format_decode_pretty(output: &DecodeOutput) -> String {
    let mut out = format!(
        "entity {} sub {} @ {} ms\n",
        output.entity_id, output.sub_index, output.timestamp_ms
    );
    for field in &output.fields {
        let [x, y, z] = field.value;
        let _ = writeln!(out, "  {:<16} ({x:.4}, {y:.4}, {z:.4})", field.name);
    }
    out
}

/// Parses a hex capture, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let digits: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits)
}

/// Names of the quantities flagged in `mask`.
#[must_use]
pub fn mask_names(mask: FieldMask) -> Vec<&'static str> {
    Quantity::ALL
        .into_iter()
        .filter(|q| mask.contains(q.bit()))
        .map(Quantity::name)
        .collect()
}
