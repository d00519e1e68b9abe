//! Snapshots, history buffering and transform messages for tsync.
//!
//! This crate ties together bitstream, wire and schema: it defines the
//! timestamped [`Snapshot`] of an entity's transform, the bounded
//! [`SnapshotHistory`] a receiver plays back from, and the body layout of
//! transform messages.
//!
//! # Features
//!
//! - Per-axis, per-quantity selective encoding
//! - Half or full precision floats per quantity
//! - Newest-first history with out-of-order rejection
//! - Shortest-arc snapshot interpolation
//!
//! # Design Principles
//!
//! - **Correctness first** - All invariants are documented and tested.
//! - **Shared layout** - Both ends must agree on a [`schema::SyncConfig`];
//!   [`check_layout`] compares layout hashes.
//! - **Deterministic** - Same inputs produce same outputs.
//!
//! # Example
//!
//! ```
//! use codec::{decode_message, encode_message, EntityId, EntityState, Snapshot, SyncIndex, Timestamp};
//! use glam::Vec3;
//! use schema::SyncConfig;
//! use wire::FieldMask;
//!
//! let config = SyncConfig::default();
//! let limits = codec::WireLimits::default();
//! let snapshot = Snapshot::from_state(
//!     Timestamp::from_millis(1000),
//!     &EntityState::at(Vec3::new(1.0, 2.0, 3.0)),
//! );
//!
//! let bytes = encode_message(
//!     EntityId::new(5),
//!     SyncIndex::ROOT,
//!     &snapshot,
//!     FieldMask::from_raw(FieldMask::POSITION),
//!     &config,
//!     &limits,
//! )
//! .unwrap();
//!
//! let decoded = decode_message(&bytes, &config, &limits, &EntityState::default()).unwrap();
//! assert_eq!(decoded.entity, EntityId::new(5));
//! assert_eq!(decoded.snapshot.position, Vec3::new(1.0, 2.0, 3.0));
//! ```

mod error;
mod history;
mod message;
mod snapshot;
mod types;

pub use error::{CodecError, CodecResult, HistoryError};
pub use history::SnapshotHistory;
pub use message::{
    body_len, check_layout, decode_message, decode_snapshot, effective_mask, encode_message,
    DecodedMessage,
};
pub use snapshot::{
    angle_between_degrees, euler_degrees, from_euler_degrees, lerp_rotation, normalize_rotation,
    EntityState, Snapshot,
};
pub use types::{EntityId, SyncIndex, Timestamp};
pub use wire::Limits as WireLimits;
