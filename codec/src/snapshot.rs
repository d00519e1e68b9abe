//! Snapshot value type and interpolation math.

use glam::{EulerRot, Quat, Vec3};

use crate::types::Timestamp;

/// Live transform and body state of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Linear velocity in units per second.
    pub velocity: Vec3,
    /// Angular velocity in radians per second, axis scaled by rate.
    pub angular_velocity: Vec3,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl EntityState {
    /// State at `position` with identity rotation, unit scale and no motion.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// One timestamped sample of an entity's synced quantities.
///
/// The rotation is always unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Snapshot {
    /// Captures `state` at `timestamp`, normalizing the rotation.
    #[must_use]
    pub fn from_state(timestamp: Timestamp, state: &EntityState) -> Self {
        Self {
            timestamp,
            position: state.position,
            rotation: normalize_rotation(state.rotation),
            scale: state.scale,
            velocity: state.velocity,
            angular_velocity: state.angular_velocity,
        }
    }

    /// The quantities without the timestamp.
    #[must_use]
    pub const fn state(&self) -> EntityState {
        EntityState {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
        }
    }

    /// Blends `from` toward `to`; `t` is clamped to `[0, 1]`.
    ///
    /// Vectors blend linearly. Rotation takes the shortest arc and is
    /// renormalized. The timestamp is interpolated and truncated.
    #[must_use]
    pub fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let ts = from.timestamp.as_i64() as f64
            + (to.timestamp.as_i64() - from.timestamp.as_i64()) as f64 * f64::from(t);
        Self {
            timestamp: Timestamp::saturating_from_i64(ts as i64),
            position: from.position.lerp(to.position, t),
            rotation: lerp_rotation(from.rotation, to.rotation, t),
            scale: from.scale.lerp(to.scale, t),
            velocity: from.velocity.lerp(to.velocity, t),
            angular_velocity: from.angular_velocity.lerp(to.angular_velocity, t),
        }
    }

    /// Returns `true` if every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.scale.is_finite()
            && self.velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// Normalizes a rotation, falling back to identity for degenerate input.
#[must_use]
pub fn normalize_rotation(rotation: Quat) -> Quat {
    let len_sq = rotation.length_squared();
    if len_sq.is_finite() && len_sq > f32::EPSILON {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    }
}

/// Shortest-arc normalized lerp; `t` is clamped to `[0, 1]`.
#[must_use]
pub fn lerp_rotation(from: Quat, to: Quat, t: f32) -> Quat {
    let t = t.clamp(0.0, 1.0);
    let to = if from.dot(to) < 0.0 { -to } else { to };
    normalize_rotation(from * (1.0 - t) + to * t)
}

/// Angle between two rotations in degrees, in `[0, 180]`.
#[must_use]
pub fn angle_between_degrees(a: Quat, b: Quat) -> f32 {
    let dot = a.dot(b).abs().min(1.0);
    (2.0 * dot.acos()).to_degrees()
}

/// Euler angles in degrees, each wrapped into `[0, 360)`.
///
/// The order is yaw about Y, then pitch about X, then roll about Z, so
/// `from_euler_degrees(euler_degrees(q))` reproduces `q`.
#[must_use]
pub fn euler_degrees(rotation: Quat) -> Vec3 {
    let (y, x, z) = rotation.to_euler(EulerRot::YXZ);
    Vec3::new(wrap_degrees(x), wrap_degrees(y), wrap_degrees(z))
}

/// Rotation from Euler angles in degrees (see [`euler_degrees`]).
#[must_use]
pub fn from_euler_degrees(euler: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    )
}

fn wrap_degrees(radians: f32) -> f32 {
    let deg = radians.to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: u32, x: f32) -> Snapshot {
        Snapshot::from_state(Timestamp::from_millis(ts), &EntityState::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn from_state_normalizes_rotation() {
        let state = EntityState {
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 2.0),
            ..EntityState::default()
        };
        let s = Snapshot::from_state(Timestamp::default(), &state);
        assert!((s.rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_rotation_becomes_identity() {
        assert_eq!(normalize_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)), Quat::IDENTITY);
        assert_eq!(
            normalize_rotation(Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0)),
            Quat::IDENTITY
        );
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = snap(1000, 0.0);
        let b = snap(1100, 10.0);
        assert_eq!(Snapshot::lerp(&a, &b, 0.0).position, a.position);
        assert_eq!(Snapshot::lerp(&a, &b, 1.0).position, b.position);
        let mid = Snapshot::lerp(&a, &b, 0.5);
        assert_eq!(mid.position.x, 5.0);
        assert_eq!(mid.timestamp.millis(), 1050);
    }

    #[test]
    fn lerp_clamps_t() {
        let a = snap(0, 0.0);
        let b = snap(100, 10.0);
        assert_eq!(Snapshot::lerp(&a, &b, 2.0).position.x, 10.0);
        assert_eq!(Snapshot::lerp(&a, &b, -1.0).position.x, 0.0);
        assert_eq!(Snapshot::lerp(&a, &b, f32::NAN).position.x, 0.0);
    }

    #[test]
    fn rotation_lerp_takes_short_arc() {
        let a = Quat::from_rotation_y(0.0);
        let b = -Quat::from_rotation_y(0.2);
        let mid = lerp_rotation(a, b, 0.5);
        assert!(angle_between_degrees(mid, Quat::from_rotation_y(0.1)) < 0.01);
    }

    #[test]
    fn angle_between_known_values() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_z(90f32.to_radians());
        assert!((angle_between_degrees(a, b) - 90.0).abs() < 1e-3);
        assert!(angle_between_degrees(b, -b) < 1e-2);
    }

    #[test]
    fn euler_roundtrip() {
        let q = from_euler_degrees(Vec3::new(30.0, 45.0, 60.0));
        let e = euler_degrees(q);
        assert!((e - Vec3::new(30.0, 45.0, 60.0)).abs().max_element() < 1e-3);
        assert!(angle_between_degrees(from_euler_degrees(e), q) < 1e-2);
    }

    #[test]
    fn euler_wraps_into_positive_range() {
        let q = from_euler_degrees(Vec3::new(0.0, -90.0, 0.0));
        let e = euler_degrees(q);
        assert!((e.y - 270.0).abs() < 1e-3);
        assert!(e.x >= 0.0 && e.x < 360.0);
    }

    #[test]
    fn single_axis_euler_matches_axis_rotation() {
        let q = from_euler_degrees(Vec3::new(0.0, 90.0, 0.0));
        assert!(angle_between_degrees(q, Quat::from_rotation_y(90f32.to_radians())) < 1e-3);
    }

    #[test]
    fn lerp_rotation_hits_both_endpoints_with_unit_norm() {
        let a = Snapshot::from_state(
            Timestamp::from_millis(0),
            &EntityState {
                rotation: from_euler_degrees(Vec3::new(10.0, 200.0, 30.0)),
                ..EntityState::default()
            },
        );
        let b = Snapshot::from_state(
            Timestamp::from_millis(100),
            &EntityState {
                rotation: from_euler_degrees(Vec3::new(80.0, 15.0, 300.0)),
                ..EntityState::default()
            },
        );
        assert!(angle_between_degrees(Snapshot::lerp(&a, &b, 0.0).rotation, a.rotation) < 0.1);
        assert!(angle_between_degrees(Snapshot::lerp(&a, &b, 1.0).rotation, b.rotation) < 0.1);
        for i in 0..=10 {
            let q = Snapshot::lerp(&a, &b, i as f32 / 10.0).rotation;
            assert!((q.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn finite_check() {
        let mut s = snap(0, 1.0);
        assert!(s.is_finite());
        s.velocity.y = f32::INFINITY;
        assert!(!s.is_finite());
    }
}
