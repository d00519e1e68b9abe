//! Per-entity transform sync configuration for the tsync codec.
//!
//! This crate defines what gets synced for one entity and how:
//! - The five quantities and their per-axis masks
//! - Half-precision compression flags
//! - Send/receive/snap thresholds, lerp speeds and timing
//! - The motion-source capability (no body, 3D body, 2D body)
//! - A deterministic hash of the wire layout
//!
//! # Design Principles
//!
//! - **Explicit configuration** - No reflection; every tunable is a plain field.
//! - **Resolved once** - Motion capability is normalized into the config at construction.
//! - **Deterministic hashing** - The layout hash is stable given the same masks and flags.

mod axis;
mod config;
mod error;
mod hash;

pub use axis::{AxisMask, Quantity};
pub use config::{
    BodyParams, MotionSource, QuantitySync, SyncConfig, MAX_HISTORY_CAPACITY, MIN_HISTORY_CAPACITY,
};
pub use error::{SchemaError, SchemaResult};
pub use hash::layout_hash;
