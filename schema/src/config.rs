//! Per-entity sync configuration.

use crate::axis::{AxisMask, Quantity};
use crate::error::{SchemaError, SchemaResult};

/// Smallest history buffer ever allocated.
pub const MIN_HISTORY_CAPACITY: usize = 30;

/// Largest history buffer a valid config may ask for.
pub const MAX_HISTORY_CAPACITY: usize = 4096;

/// How one quantity travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantitySync {
    /// Axes written to the wire. Empty disables the quantity.
    pub axes: AxisMask,
    /// Write each axis as a half float (2 bytes) instead of a full float.
    pub compressed: bool,
}

impl QuantitySync {
    #[must_use]
    pub const fn new(axes: AxisMask, compressed: bool) -> Self {
        Self { axes, compressed }
    }

    /// Disabled quantity.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(AxisMask::NONE, true)
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !self.axes.is_empty()
    }

    /// Bytes one axis occupies on the wire.
    #[must_use]
    pub const fn bytes_per_axis(self) -> usize {
        if self.compressed {
            2
        } else {
            4
        }
    }

    /// Bytes this quantity occupies in a message body when present.
    #[must_use]
    pub const fn encoded_len(self) -> usize {
        self.axes.count() * self.bytes_per_axis()
    }
}

impl Default for QuantitySync {
    fn default() -> Self {
        Self::new(AxisMask::XYZ, true)
    }
}

/// Physical parameters of a body that feeds velocities.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BodyParams {
    /// Kinematic bodies are moved by transform only: no extrapolation, no
    /// velocity correction.
    pub kinematic: bool,
    /// Linear drag coefficient.
    pub drag: f32,
    /// Whether gravity applies (linear bodies).
    pub use_gravity: bool,
    /// Gravity multiplier (planar bodies).
    pub gravity_scale: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            kinematic: false,
            drag: 0.0,
            use_gravity: true,
            gravity_scale: 1.0,
        }
    }
}

/// What feeds the entity's velocities, resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionSource {
    /// Transform only; velocities are always zero.
    #[default]
    None,
    /// Full 3D body.
    LinearBody(BodyParams),
    /// 2D body moving in the XY plane, spinning about Z.
    PlanarBody(BodyParams),
}

impl MotionSource {
    /// Body parameters, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&BodyParams> {
        match self {
            Self::None => None,
            Self::LinearBody(params) | Self::PlanarBody(params) => Some(params),
        }
    }

    #[must_use]
    pub const fn has_body(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// A body that is simulated (not kinematic).
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        match self.body() {
            Some(params) => !params.kinematic,
            None => false,
        }
    }

    #[must_use]
    pub const fn is_planar(&self) -> bool {
        matches!(self, Self::PlanarBody(_))
    }
}

/// Every tunable of one synced entity.
///
/// Times are seconds unless the name says otherwise. Rotation thresholds
/// are degrees. A send or receive threshold of zero means "any change".
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SyncConfig {
    /// Maximum owner sends per second.
    pub send_rate: f32,
    /// Deliberate playback delay on receivers.
    pub interpolation_back_time: f32,
    /// Longest forward projection past the newest snapshot.
    pub extrapolation_time_limit: f32,
    /// Farthest forward projection from the newest snapshot position.
    pub extrapolation_distance_limit: f32,

    pub send_position_threshold: f32,
    pub send_rotation_threshold: f32,
    pub send_scale_threshold: f32,
    /// Also the speed below which receivers stop extrapolating.
    pub send_velocity_threshold: f32,
    pub send_angular_velocity_threshold: f32,

    pub received_position_threshold: f32,
    pub received_rotation_threshold: f32,

    pub position_snap_threshold: f32,
    pub rotation_snap_threshold: f32,
    pub scale_snap_threshold: f32,

    pub position_lerp_speed: f32,
    pub rotation_lerp_speed: f32,
    pub scale_lerp_speed: f32,

    pub position: QuantitySync,
    pub rotation: QuantitySync,
    pub scale: QuantitySync,
    pub velocity: QuantitySync,
    pub angular_velocity: QuantitySync,

    /// World gravity used by extrapolation.
    pub gravity: [f32; 3],
    /// Extrapolation integration step.
    pub fixed_step: f32,
    /// Largest clock nudge applied per observation, in milliseconds.
    pub correction_step_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_rate: 30.0,
            interpolation_back_time: 0.1,
            extrapolation_time_limit: 0.3,
            extrapolation_distance_limit: 0.3,
            send_position_threshold: 0.001,
            send_rotation_threshold: 0.001,
            send_scale_threshold: 0.001,
            send_velocity_threshold: 0.001,
            send_angular_velocity_threshold: 0.001,
            received_position_threshold: 0.0,
            received_rotation_threshold: 0.0,
            position_snap_threshold: 8.0,
            rotation_snap_threshold: 60.0,
            scale_snap_threshold: 3.0,
            position_lerp_speed: 0.2,
            rotation_lerp_speed: 0.2,
            scale_lerp_speed: 0.2,
            position: QuantitySync::default(),
            rotation: QuantitySync::default(),
            scale: QuantitySync::default(),
            velocity: QuantitySync::default(),
            angular_velocity: QuantitySync::default(),
            gravity: [0.0, -9.81, 0.0],
            fixed_step: 0.02,
            correction_step_ms: 50,
        }
    }
}

impl SyncConfig {
    /// Wire settings of a quantity.
    #[must_use]
    pub const fn sync(&self, quantity: Quantity) -> QuantitySync {
        match quantity {
            Quantity::Position => self.position,
            Quantity::Rotation => self.rotation,
            Quantity::Scale => self.scale,
            Quantity::Velocity => self.velocity,
            Quantity::AngularVelocity => self.angular_velocity,
        }
    }

    /// Owner-side change threshold of a quantity.
    #[must_use]
    pub const fn send_threshold(&self, quantity: Quantity) -> f32 {
        match quantity {
            Quantity::Position => self.send_position_threshold,
            Quantity::Rotation => self.send_rotation_threshold,
            Quantity::Scale => self.send_scale_threshold,
            Quantity::Velocity => self.send_velocity_threshold,
            Quantity::AngularVelocity => self.send_angular_velocity_threshold,
        }
    }

    /// Seconds between owner sends.
    #[must_use]
    pub fn send_interval(&self) -> f32 {
        1.0 / self.send_rate
    }

    /// Interpolation back time in whole milliseconds.
    #[must_use]
    pub fn interpolation_back_time_ms(&self) -> i64 {
        (self.interpolation_back_time * 1000.0) as i64
    }

    /// History buffer capacity: `max(30, 2 * (trunc(send_rate * back_time) + 1))`.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        let per_window = (self.send_rate * self.interpolation_back_time).max(0.0) as usize;
        per_window
            .saturating_add(1)
            .saturating_mul(2)
            .max(MIN_HISTORY_CAPACITY)
    }

    /// Resolves the motion-source capability once.
    ///
    /// Without a body there is nothing to read velocities from, so neither
    /// velocity quantity is synced. Planar bodies move in XY and spin about Z.
    #[must_use]
    pub fn normalized_for(mut self, motion: &MotionSource) -> Self {
        match motion {
            MotionSource::None => {
                self.velocity.axes = AxisMask::NONE;
                self.angular_velocity.axes = AxisMask::NONE;
            }
            MotionSource::PlanarBody(_) => {
                if self.velocity.is_enabled() {
                    self.velocity.axes = AxisMask::XY;
                }
                if self.angular_velocity.is_enabled() {
                    self.angular_velocity.axes = AxisMask::Z;
                }
            }
            MotionSource::LinearBody(_) => {}
        }
        self
    }

    /// Checks every tunable.
    pub fn validate(&self) -> SchemaResult<()> {
        if !self.send_rate.is_finite() {
            return Err(SchemaError::NonFinite { name: "send_rate" });
        }
        if self.send_rate <= 0.0 {
            return Err(SchemaError::InvalidSendRate {
                value: self.send_rate,
            });
        }
        if !(self.fixed_step.is_finite() && self.fixed_step > 0.0) {
            return Err(SchemaError::InvalidFixedStep {
                value: self.fixed_step,
            });
        }
        if self.correction_step_ms == 0 {
            return Err(SchemaError::InvalidCorrectionStep);
        }

        let non_negative = [
            ("interpolation_back_time", self.interpolation_back_time),
            ("extrapolation_time_limit", self.extrapolation_time_limit),
            (
                "extrapolation_distance_limit",
                self.extrapolation_distance_limit,
            ),
            ("send_position_threshold", self.send_position_threshold),
            ("send_rotation_threshold", self.send_rotation_threshold),
            ("send_scale_threshold", self.send_scale_threshold),
            ("send_velocity_threshold", self.send_velocity_threshold),
            (
                "send_angular_velocity_threshold",
                self.send_angular_velocity_threshold,
            ),
            (
                "received_position_threshold",
                self.received_position_threshold,
            ),
            (
                "received_rotation_threshold",
                self.received_rotation_threshold,
            ),
            ("position_snap_threshold", self.position_snap_threshold),
            ("rotation_snap_threshold", self.rotation_snap_threshold),
            ("scale_snap_threshold", self.scale_snap_threshold),
        ];
        for (name, value) in non_negative {
            check_non_negative(name, value)?;
        }

        let lerp_speeds = [
            ("position_lerp_speed", self.position_lerp_speed),
            ("rotation_lerp_speed", self.rotation_lerp_speed),
            ("scale_lerp_speed", self.scale_lerp_speed),
        ];
        for (name, value) in lerp_speeds {
            if !value.is_finite() {
                return Err(SchemaError::NonFinite { name });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(SchemaError::LerpSpeedOutOfRange { name, value });
            }
        }

        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(SchemaError::NonFinite { name: "gravity" });
        }

        let capacity = self.history_capacity();
        if capacity > MAX_HISTORY_CAPACITY {
            return Err(SchemaError::HistoryTooLarge {
                capacity,
                max: MAX_HISTORY_CAPACITY,
            });
        }
        Ok(())
    }
}

fn check_non_negative(name: &'static str, value: f32) -> SchemaResult<()> {
    if !value.is_finite() {
        return Err(SchemaError::NonFinite { name });
    }
    if value < 0.0 {
        return Err(SchemaError::Negative { name, value });
    }
    Ok(())
}
