//! Owner-side change detection.

use codec::{angle_between_degrees, EntityState, Snapshot};
use glam::{Quat, Vec3};
use schema::{MotionSource, Quantity, SyncConfig};
use wire::FieldMask;

/// Values last transmitted per quantity; `None` until first sent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LastSent {
    position: Option<Vec3>,
    rotation: Option<Quat>,
    scale: Option<Vec3>,
    velocity: Option<Vec3>,
    angular_velocity: Option<Vec3>,
}

/// Decides which quantities the owner must transmit this tick.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    last: LastSent,
    force: bool,
}

impl ChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every enabled quantity send on the next evaluation.
    pub fn force_send_next(&mut self) {
        self.force = true;
    }

    #[must_use]
    pub const fn is_forced(&self) -> bool {
        self.force
    }

    /// Drops a pending force without recording a send.
    pub fn clear_force(&mut self) {
        self.force = false;
    }

    /// Whether `quantity` changed enough since it was last sent.
    ///
    /// A quantity with no synced axes never sends. Velocities never send
    /// without a body to read them from.
    #[must_use]
    pub fn should_send(
        &self,
        quantity: Quantity,
        current: &EntityState,
        config: &SyncConfig,
        motion: &MotionSource,
    ) -> bool {
        if !config.sync(quantity).is_enabled() {
            return false;
        }
        if matches!(quantity, Quantity::Velocity | Quantity::AngularVelocity) && !motion.has_body()
        {
            return false;
        }
        if self.force {
            return true;
        }

        let threshold = config.send_threshold(quantity);
        let exceeds = |metric: f32| threshold == 0.0 || metric > threshold;
        match quantity {
            Quantity::Position => vector_changed(self.last.position, current.position, exceeds),
            Quantity::Scale => vector_changed(self.last.scale, current.scale, exceeds),
            Quantity::Rotation => match self.last.rotation {
                None => true,
                Some(last) => {
                    last != current.rotation
                        && exceeds(angle_between_degrees(last, current.rotation))
                }
            },
            Quantity::Velocity if motion.is_planar() => vector_changed(
                self.last.velocity.map(|v| v.truncate().extend(0.0)),
                current.velocity.truncate().extend(0.0),
                exceeds,
            ),
            Quantity::Velocity => vector_changed(self.last.velocity, current.velocity, exceeds),
            Quantity::AngularVelocity if motion.is_planar() => match self.last.angular_velocity {
                None => true,
                Some(last) => {
                    let spin = current.angular_velocity.z;
                    last.z != spin && exceeds((last.z - spin).abs())
                }
            },
            Quantity::AngularVelocity => {
                vector_changed(self.last.angular_velocity, current.angular_velocity, exceeds)
            }
        }
    }

    /// Evaluates every quantity into a field mask.
    #[must_use]
    pub fn changed_fields(
        &self,
        current: &EntityState,
        config: &SyncConfig,
        motion: &MotionSource,
    ) -> FieldMask {
        Quantity::ALL
            .into_iter()
            .filter(|&q| self.should_send(q, current, config, motion))
            .fold(FieldMask::EMPTY, |mask, q| mask.with(q.bit()))
    }

    /// Remembers what was transmitted and clears a pending force.
    ///
    /// Call once per send, however many peers receive it.
    pub fn record_sent(&mut self, mask: FieldMask, sent: &Snapshot) {
        if mask.contains(FieldMask::POSITION) {
            self.last.position = Some(sent.position);
        }
        if mask.contains(FieldMask::ROTATION) {
            self.last.rotation = Some(sent.rotation);
        }
        if mask.contains(FieldMask::SCALE) {
            self.last.scale = Some(sent.scale);
        }
        if mask.contains(FieldMask::VELOCITY) {
            self.last.velocity = Some(sent.velocity);
        }
        if mask.contains(FieldMask::ANGULAR_VELOCITY) {
            self.last.angular_velocity = Some(sent.angular_velocity);
        }
        self.force = false;
    }

    /// Forgets every last-sent value.
    pub fn reset(&mut self) {
        self.last = LastSent::default();
    }
}

fn vector_changed(last: Option<Vec3>, current: Vec3, exceeds: impl Fn(f32) -> bool) -> bool {
    match last {
        None => true,
        Some(last) => last != current && exceeds(last.distance(current)),
    }
}
