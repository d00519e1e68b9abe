//! Synced quantities and per-axis masks.

use std::fmt;

/// Subset of the X/Y/Z axes that are synced for a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AxisMask(u8);

impl AxisMask {
    pub const NONE: Self = Self(0);
    pub const X: Self = Self(1);
    pub const Y: Self = Self(2);
    pub const Z: Self = Self(4);
    pub const XY: Self = Self(1 | 2);
    pub const XZ: Self = Self(1 | 4);
    pub const YZ: Self = Self(2 | 4);
    pub const XYZ: Self = Self(1 | 2 | 4);

    /// Creates a mask from raw bits, dropping anything beyond the three axes.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn x(self) -> bool {
        self.0 & 1 != 0
    }

    #[must_use]
    pub const fn y(self) -> bool {
        self.0 & 2 != 0
    }

    #[must_use]
    pub const fn z(self) -> bool {
        self.0 & 4 != 0
    }

    /// Returns `true` if the axis at `index` (0 = X, 1 = Y, 2 = Z) is synced.
    #[must_use]
    pub const fn has(self, index: usize) -> bool {
        index < 3 && self.0 & (1 << index) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of synced axes.
    #[must_use]
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the synced axis indices in X, Y, Z order.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..3).filter(move |&i| self.has(i))
    }
}

impl fmt::Display for AxisMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        for (i, name) in ["X", "Y", "Z"].iter().enumerate() {
            if self.has(i) {
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}

/// One of the five synced quantities, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Position,
    Rotation,
    Scale,
    Velocity,
    AngularVelocity,
}

impl Quantity {
    /// Every quantity, in wire order.
    pub const ALL: [Self; 5] = [
        Self::Position,
        Self::Rotation,
        Self::Scale,
        Self::Velocity,
        Self::AngularVelocity,
    ];

    /// Bit of this quantity in the field-presence mask.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Short name used in logs and tool output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Rotation => "rotation",
            Self::Scale => "scale",
            Self::Velocity => "velocity",
            Self::AngularVelocity => "angular_velocity",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
