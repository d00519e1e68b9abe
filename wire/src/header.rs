//! Message header types and constants.

use std::fmt;

/// Largest possible encoded header in bytes: mask plus three varints.
pub const MAX_HEADER_SIZE: usize = 1 + 5 + 5 + 5;

/// Smallest possible encoded header in bytes: mask plus three one-byte varints.
pub const MIN_HEADER_SIZE: usize = 1 + 1 + 1 + 1;

/// Field-presence mask, the first byte of every transform message.
///
/// One bit per synced quantity, in body order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldMask(u8);

impl FieldMask {
    /// Position is present.
    pub const POSITION: u8 = 1 << 0;
    /// Rotation (as Euler axes) is present.
    pub const ROTATION: u8 = 1 << 1;
    /// Scale is present.
    pub const SCALE: u8 = 1 << 2;
    /// Linear velocity is present.
    pub const VELOCITY: u8 = 1 << 3;
    /// Angular velocity is present.
    pub const ANGULAR_VELOCITY: u8 = 1 << 4;

    /// Reserved bits mask (must be zero).
    const RESERVED_MASK: u8 = !0b1_1111;

    /// The empty mask: a header-only message.
    pub const EMPTY: Self = Self(0);

    /// Every quantity present.
    pub const ALL: Self = Self(0b1_1111);

    /// Creates a mask from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw mask bits.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns `true` if no reserved bits are set.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 & Self::RESERVED_MASK == 0
    }

    /// Returns `true` if no quantity is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `bit` is set.
    #[must_use]
    pub const fn contains(self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    /// Returns the mask with `bit` set.
    #[must_use]
    pub const fn with(self, bit: u8) -> Self {
        Self(self.0 | bit)
    }

    /// Returns the mask with `bit` cleared.
    #[must_use]
    pub const fn without(self, bit: u8) -> Self {
        Self(self.0 & !bit)
    }

    /// Sets `bit` in place.
    pub fn insert(&mut self, bit: u8) {
        self.0 |= bit;
    }

    /// Number of quantities present.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::POSITION, "pos"),
            (Self::ROTATION, "rot"),
            (Self::SCALE, "scale"),
            (Self::VELOCITY, "vel"),
            (Self::ANGULAR_VELOCITY, "ang_vel"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Decoded message header.
///
/// Layout: mask (1 byte), then entity id, sub-object index and owner
/// timestamp as LEB128 varints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Which quantities follow in the body.
    pub mask: FieldMask,
    /// Networked entity identifier.
    pub entity_id: u32,
    /// Synced part within the entity.
    pub sub_index: u32,
    /// Owner clock in milliseconds.
    pub timestamp: u32,
}

impl MessageHeader {
    /// Creates a new header.
    #[must_use]
    pub const fn new(mask: FieldMask, entity_id: u32, sub_index: u32, timestamp: u32) -> Self {
        Self {
            mask,
            entity_id,
            sub_index,
            timestamp,
        }
    }
}
