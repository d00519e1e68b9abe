//! Receiver-side playback: pick a target from history and drive the entity toward it.
//!
//! Each tick the engine computes a target snapshot for
//! `estimated owner time - interpolation back time`:
//!
//! - **Interpolating** when at least two snapshots are buffered and the
//!   newest is later than the target time.
//! - **Extrapolating** from the newest snapshot otherwise, stepping a
//!   simple body simulation (velocity, gravity, drag, spin) in fixed steps.
//! - **ExtrapolationClamped** when that simulation runs past the time or
//!   distance ceiling. The clamped snapshot is frozen until new data arrives.
//! - **Frozen** right after a teleport, when the live transform is taken
//!   as the target so nothing stale is blended in.
//!
//! The target is then applied with receive thresholds, snap thresholds and
//! per-quantity lerp speeds, writing only the synced axes.

use std::fmt;

use codec::{
    angle_between_degrees, euler_degrees, from_euler_degrees, lerp_rotation, normalize_rotation,
    EntityState, HistoryError, Snapshot, SnapshotHistory, Timestamp,
};
use glam::{Quat, Vec3};
use schema::{AxisMask, MotionSource, SyncConfig};
use tracing::{debug, trace};

use crate::adapter::EntityAdapter;

/// What the engine did on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing buffered; the entity is left alone.
    Idle,
    Interpolating,
    Extrapolating,
    /// Extrapolation hit its time or distance ceiling.
    ExtrapolationClamped,
    /// Post-teleport tick targeting the live transform.
    Frozen,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Interpolating => "interpolating",
            Self::Extrapolating => "extrapolating",
            Self::ExtrapolationClamped => "extrapolation_clamped",
            Self::Frozen => "frozen",
        };
        f.write_str(name)
    }
}

/// Lerp factors for one correction.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LerpSpeeds {
    position: f32,
    rotation: f32,
    scale: f32,
}

impl LerpSpeeds {
    const INSTANT: Self = Self {
        position: 1.0,
        rotation: 1.0,
        scale: 1.0,
    };

    fn from_config(config: &SyncConfig) -> Self {
        Self {
            position: config.position_lerp_speed,
            rotation: config.rotation_lerp_speed,
            scale: config.scale_lerp_speed,
        }
    }
}

/// History buffer plus the playback state that outlives a single tick.
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    history: SnapshotHistory,
    /// Local time of the last accepted snapshot.
    last_received_at: f64,
    /// Snapshot held while extrapolation is clamped.
    frozen: Option<Snapshot>,
    /// Local time extrapolation was last clamped.
    stop_time: f64,
    /// Set by a teleport: target the live transform.
    dont_lerp: bool,
    /// Set when data arrives after a teleport: next tick is instant.
    skip_lerp: bool,
}

impl PlaybackEngine {
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            history: SnapshotHistory::for_config(config),
            last_received_at: f64::NEG_INFINITY,
            frozen: None,
            stop_time: f64::NEG_INFINITY,
            dont_lerp: false,
            skip_lerp: false,
        }
    }

    #[must_use]
    pub const fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    /// The frozen snapshot of the current or last clamp, if any.
    #[must_use]
    pub const fn frozen(&self) -> Option<&Snapshot> {
        self.frozen.as_ref()
    }

    /// Buffers a received snapshot at local time `local_secs`.
    pub fn ingest(&mut self, snapshot: Snapshot, local_secs: f64) -> Result<(), HistoryError> {
        self.history.ingest(snapshot)?;
        self.last_received_at = local_secs;
        Ok(())
    }

    /// Drops every buffered snapshot and any clamp.
    pub fn clear(&mut self) {
        self.history.clear();
        self.frozen = None;
        self.stop_time = f64::NEG_INFINITY;
    }

    /// Stops blending from buffered data (teleport).
    pub fn stop_lerping(&mut self) {
        self.dont_lerp = true;
    }

    /// Resumes playback after a teleport with one instant correction.
    pub fn restart_lerping(&mut self) {
        if self.dont_lerp {
            self.skip_lerp = true;
        }
    }

    #[must_use]
    pub const fn is_lerping(&self) -> bool {
        !self.dont_lerp
    }

    /// Computes the target snapshot for owner time `target_time`.
    ///
    /// Returns `None` when nothing is buffered.
    pub fn sample(
        &mut self,
        target_time: i64,
        local_secs: f64,
        config: &SyncConfig,
        motion: &MotionSource,
    ) -> Option<(Snapshot, PlaybackState)> {
        let newest = *self.history.newest()?;
        if self.history.len() > 1 && newest.timestamp.as_i64() > target_time {
            let target = interpolate(&self.history, target_time)?;
            return Some((target, PlaybackState::Interpolating));
        }
        let (target, clamped) = self.extrapolate(&newest, target_time, local_secs, config, motion);
        let state = if clamped {
            PlaybackState::ExtrapolationClamped
        } else {
            PlaybackState::Extrapolating
        };
        Some((target, state))
    }

    /// Runs one playback tick against `adapter`.
    pub fn apply<A: EntityAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        target_time: i64,
        local_secs: f64,
        config: &SyncConfig,
        motion: &MotionSource,
    ) -> PlaybackState {
        if self.history.is_empty() {
            return PlaybackState::Idle;
        }

        let live = adapter.local_state();
        let (target, state) = if self.dont_lerp {
            (
                Snapshot::from_state(Timestamp::default(), &live),
                PlaybackState::Frozen,
            )
        } else {
            match self.sample(target_time, local_secs, config, motion) {
                Some(sampled) => sampled,
                None => return PlaybackState::Idle,
            }
        };

        let speeds = if self.skip_lerp {
            self.skip_lerp = false;
            self.dont_lerp = false;
            LerpSpeeds::INSTANT
        } else if self.dont_lerp {
            self.history.clear();
            LerpSpeeds::INSTANT
        } else {
            LerpSpeeds::from_config(config)
        };

        trace!(%state, target_time, "playback tick");

        if state == PlaybackState::ExtrapolationClamped && motion.has_body() {
            adapter.set_velocities(Vec3::ZERO, Vec3::ZERO);
            return state;
        }
        correct(adapter, &live, &target, speeds, config, motion);
        state
    }

    fn extrapolate(
        &mut self,
        newest: &Snapshot,
        target_time: i64,
        local_secs: f64,
        config: &SyncConfig,
        motion: &MotionSource,
    ) -> (Snapshot, bool) {
        if !config.velocity.is_enabled()
            || newest.velocity.length() < config.send_velocity_threshold
        {
            return (*newest, false);
        }
        let Some(body) = motion.body().filter(|body| !body.kinematic) else {
            return (*newest, false);
        };

        let length = (target_time - newest.timestamp.as_i64()) as f32 / 1000.0;
        let gravity = Vec3::from(config.gravity);
        let mut target = *newest;
        let mut simulated = 0.0f32;
        while simulated < length {
            if simulated > config.extrapolation_time_limit {
                return (self.freeze(target, local_secs), true);
            }

            let dt = config.fixed_step.min(length - simulated);
            target.position += target.velocity * dt;
            if motion.is_planar() {
                target.velocity += gravity * body.gravity_scale * dt;
            } else if body.use_gravity {
                target.velocity += gravity * dt;
            }
            target.velocity -= target.velocity * dt * body.drag;

            let spin = target.angular_velocity.length();
            if spin > f32::EPSILON {
                let step = Quat::from_axis_angle(target.angular_velocity / spin, spin * dt);
                target.rotation = normalize_rotation(step * target.rotation);
            }

            if newest.position.distance(target.position) >= config.extrapolation_distance_limit {
                return (self.freeze(target, local_secs), true);
            }
            simulated += config.fixed_step;
        }
        (target, false)
    }

    /// Holds the first clamped snapshot until newer data arrives.
    fn freeze(&mut self, candidate: Snapshot, local_secs: f64) -> Snapshot {
        let frozen = match self.frozen {
            Some(frozen) if self.stop_time >= self.last_received_at => frozen,
            _ => {
                debug!(timestamp = candidate.timestamp.millis(), "extrapolation clamped");
                self.frozen = Some(candidate);
                candidate
            }
        };
        self.stop_time = local_secs;
        frozen
    }
}

/// Blends the two buffered snapshots around `target_time`.
///
/// Scans newest to oldest for the first snapshot at or before
/// `target_time`; if every snapshot is later, the oldest is used. Equal
/// timestamps yield the start snapshot.
#[must_use]
pub fn interpolate(history: &SnapshotHistory, target_time: i64) -> Option<Snapshot> {
    let len = history.len();
    let index = history
        .iter()
        .position(|s| s.timestamp.as_i64() <= target_time)
        .unwrap_or(len.checked_sub(1)?);
    let start = history.get(index)?;
    let end = history.get(index.saturating_sub(1))?;

    let span = end.timestamp.as_i64() - start.timestamp.as_i64();
    let t = if span == 0 {
        0.0
    } else {
        ((target_time - start.timestamp.as_i64()) as f64 / span as f64) as f32
    };
    Some(Snapshot::lerp(start, end, t))
}

fn correct<A: EntityAdapter + ?Sized>(
    adapter: &mut A,
    live: &EntityState,
    target: &Snapshot,
    speeds: LerpSpeeds,
    config: &SyncConfig,
    motion: &MotionSource,
) {
    let position_delta = if live.position != target.position
        && (config.position_snap_threshold != 0.0 || config.received_position_threshold != 0.0)
    {
        live.position.distance(target.position)
    } else {
        0.0
    };
    let position_changed = config.received_position_threshold == 0.0
        || position_delta > config.received_position_threshold;

    let rotation_delta = if live.rotation != target.rotation
        && (config.rotation_snap_threshold != 0.0 || config.received_rotation_threshold != 0.0)
    {
        angle_between_degrees(live.rotation, target.rotation)
    } else {
        0.0
    };
    let rotation_changed = config.received_rotation_threshold == 0.0
        || rotation_delta > config.received_rotation_threshold;

    let scale_changed = live.scale != target.scale;
    let scale_delta = if scale_changed && config.scale_snap_threshold != 0.0 {
        live.scale.distance(target.scale)
    } else {
        0.0
    };

    if motion.is_dynamic() {
        let (velocity, angular_velocity) = corrected_velocities(
            live,
            target,
            speeds,
            config,
            motion,
            position_changed,
            rotation_changed,
        );
        adapter.set_velocities(velocity, angular_velocity);
    }

    let mut position = live.position;
    let mut rotation = live.rotation;
    let mut scale = live.scale;
    let mut written = false;
    let mut teleport = false;

    if config.position.is_enabled() && position_changed {
        let snap = snaps(position_delta, config.position_snap_threshold);
        let speed = if snap { 1.0 } else { speeds.position };
        let goal = masked(live.position, target.position, config.position.axes);
        position = blend(live.position, goal, speed);
        written = true;
        teleport |= snap;
    }

    if config.rotation.is_enabled() && rotation_changed {
        let snap = snaps(rotation_delta, config.rotation_snap_threshold);
        let speed = if snap { 1.0 } else { speeds.rotation };
        let goal = if config.rotation.axes == AxisMask::XYZ {
            target.rotation
        } else {
            let goal = masked(
                euler_degrees(live.rotation),
                euler_degrees(target.rotation),
                config.rotation.axes,
            );
            from_euler_degrees(goal)
        };
        rotation = if speed >= 1.0 {
            goal
        } else {
            lerp_rotation(live.rotation, goal, speed)
        };
        written = true;
        teleport |= snap;
    }

    if config.scale.is_enabled() && scale_changed {
        let snap = snaps(scale_delta, config.scale_snap_threshold);
        let speed = if snap { 1.0 } else { speeds.scale };
        let goal = masked(live.scale, target.scale, config.scale.axes);
        scale = blend(live.scale, goal, speed);
        written = true;
        teleport |= snap;
    }

    if written {
        adapter.set_local_state(position, rotation, scale, teleport);
    }
}

/// Body velocities after a correction.
///
/// Velocities follow the target only while the transform is being
/// corrected; otherwise they are zeroed so the body does not drift.
fn corrected_velocities(
    live: &EntityState,
    target: &Snapshot,
    speeds: LerpSpeeds,
    config: &SyncConfig,
    motion: &MotionSource,
    position_changed: bool,
    rotation_changed: bool,
) -> (Vec3, Vec3) {
    let mut velocity = live.velocity;
    let mut angular = live.angular_velocity;

    if motion.is_planar() {
        if config.velocity.is_enabled() {
            velocity = if position_changed {
                let goal = Vec3::new(target.velocity.x, target.velocity.y, live.velocity.z);
                blend(live.velocity, goal, speeds.position)
            } else {
                Vec3::new(0.0, 0.0, live.velocity.z)
            };
        }
        if config.angular_velocity.is_enabled() {
            angular.z = if rotation_changed {
                live.angular_velocity.z
                    + (target.angular_velocity.z - live.angular_velocity.z) * speeds.rotation
            } else {
                0.0
            };
        }
        return (velocity, angular);
    }

    if position_changed {
        let goal = masked(live.velocity, target.velocity, config.velocity.axes);
        velocity = blend(live.velocity, goal, speeds.position);
    } else {
        velocity = Vec3::ZERO;
        angular = Vec3::ZERO;
    }
    if rotation_changed {
        let goal = masked(angular, target.angular_velocity, config.angular_velocity.axes);
        angular = blend(angular, goal, speeds.rotation);
    } else {
        angular = Vec3::ZERO;
    }
    (velocity, angular)
}

/// `live` with the axes in `axes` taken from `target`.
fn masked(live: Vec3, target: Vec3, axes: AxisMask) -> Vec3 {
    let mut out = live;
    for axis in axes.indices() {
        out[axis] = target[axis];
    }
    out
}

fn blend(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    if t >= 1.0 {
        to
    } else {
        from.lerp(to, t)
    }
}

/// A zero snap threshold never snaps.
fn snaps(delta: f32, threshold: f32) -> bool {
    threshold != 0.0 && delta > threshold
}
