//! One synced object: owner send path and receiver playback path.

use codec::{
    decode_snapshot, encode_message, CodecResult, DecodedMessage, EntityId, EntityState,
    HistoryError, Snapshot, SyncIndex, Timestamp,
};
use glam::{Quat, Vec3};
use schema::{MotionSource, SchemaResult, SyncConfig};
use tracing::{debug, warn};
use wire::{Channel, FieldMask};

use crate::adapter::EntityAdapter;
use crate::change::ChangeDetector;
use crate::clock::ClockReconciler;
use crate::playback::{PlaybackEngine, PlaybackState};

/// What happened to a received snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    /// Timestamped at or before the last teleport.
    BeforeTeleport,
    /// Older than the newest buffered snapshot.
    OutOfOrder,
}

/// A message the owner decided to send this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerUpdate {
    pub mask: FieldMask,
    pub bytes: Vec<u8>,
}

/// Sync state of one entity (or one sub-object of an entity).
///
/// Owned entities produce updates from their adapter's live state.
/// Non-owned entities buffer received snapshots and play them back into
/// the adapter. Time only moves through [`SyncedEntity::advance`].
#[derive(Debug)]
pub struct SyncedEntity<A> {
    id: EntityId,
    sub_index: SyncIndex,
    config: SyncConfig,
    motion: MotionSource,
    owned: bool,
    channel: Channel,
    adapter: A,
    local_secs: f64,
    clock: ClockReconciler,
    change: ChangeDetector,
    playback: PlaybackEngine,
    last_sent_at: Option<f64>,
    last_teleport: Option<Timestamp>,
}

impl<A: EntityAdapter> SyncedEntity<A> {
    /// Validates `config` and resolves it against `motion`.
    pub fn new(
        id: EntityId,
        sub_index: SyncIndex,
        config: SyncConfig,
        motion: MotionSource,
        owned: bool,
        adapter: A,
    ) -> SchemaResult<Self> {
        config.validate()?;
        let config = config.normalized_for(&motion);
        Ok(Self {
            id,
            sub_index,
            clock: ClockReconciler::new(config.correction_step_ms),
            playback: PlaybackEngine::new(&config),
            config,
            motion,
            owned,
            channel: Channel::default(),
            adapter,
            local_secs: 0.0,
            change: ChangeDetector::new(),
            last_sent_at: None,
            last_teleport: None,
        })
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub const fn sub_index(&self) -> SyncIndex {
        self.sub_index
    }

    /// The config after motion-source normalization.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn motion(&self) -> &MotionSource {
        &self.motion
    }

    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.owned
    }

    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    pub fn set_channel(&mut self, channel: Channel) {
        self.channel = channel;
    }

    #[must_use]
    pub const fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    #[must_use]
    pub const fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    #[must_use]
    pub const fn local_time(&self) -> f64 {
        self.local_secs
    }

    /// Advances local time by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.local_secs += dt;
        }
    }

    /// Owner clock reading stamped on outgoing snapshots.
    #[must_use]
    pub fn owner_time(&self) -> Timestamp {
        Timestamp::saturating_from_i64((self.local_secs * 1000.0) as i64)
    }

    /// Estimated owner time on a receiver.
    #[must_use]
    pub fn estimated_owner_time(&self) -> i64 {
        self.clock.now(self.local_secs)
    }

    /// Sends every enabled quantity on the next owner tick.
    pub fn force_send_next(&mut self) {
        self.change.force_send_next();
    }

    /// Gains or loses ownership; all receive and send state is reset.
    pub fn set_ownership(&mut self, owned: bool) {
        self.owned = owned;
        self.playback.clear();
        self.clock.reset();
        self.change.reset();
        self.last_sent_at = None;
        debug!(
            entity = self.id.raw(),
            sub_index = self.sub_index.raw(),
            owned,
            "ownership changed"
        );
    }

    /// Owner tick: encodes an update if the send interval has elapsed and
    /// anything changed enough.
    ///
    /// When nothing changed the send timer keeps running, so the next
    /// change goes out immediately.
    pub fn produce_update(&mut self, limits: &wire::Limits) -> CodecResult<Option<OwnerUpdate>> {
        if !self.owned {
            return Ok(None);
        }
        let interval = f64::from(self.config.send_interval());
        let due = self
            .last_sent_at
            .map_or(true, |at| self.local_secs - at >= interval);
        if !due && !self.change.is_forced() {
            return Ok(None);
        }

        let live = self.adapter.local_state();
        let mask = self.change.changed_fields(&live, &self.config, &self.motion);
        if mask.is_empty() {
            // A force with nothing enabled can never be honoured.
            self.change.clear_force();
            return Ok(None);
        }

        let snapshot = Snapshot::from_state(self.owner_time(), &live);
        let bytes = encode_message(
            self.id,
            self.sub_index,
            &snapshot,
            mask,
            &self.config,
            limits,
        )?;
        self.last_sent_at = Some(self.local_secs);
        self.change.record_sent(mask, &snapshot);
        Ok(Some(OwnerUpdate { mask, bytes }))
    }

    /// Decodes a message addressed to this entity.
    ///
    /// Omitted quantities come from the newest buffered snapshot, or the
    /// live state when nothing is buffered.
    pub fn decode(&self, bytes: &[u8], limits: &wire::Limits) -> CodecResult<DecodedMessage> {
        let message = wire::decode_message(bytes, limits)?;
        let fallback = self.fallback_state();
        let (mask, snapshot) = decode_snapshot(&message, &self.config, &fallback)?;
        Ok(DecodedMessage {
            entity: EntityId::new(message.header.entity_id),
            sub_index: SyncIndex::new(message.header.sub_index),
            mask,
            snapshot,
        })
    }

    fn fallback_state(&self) -> EntityState {
        self.playback
            .history()
            .newest()
            .map_or_else(|| self.adapter.local_state(), Snapshot::state)
    }

    /// Receiver path for a decoded snapshot: clock, teleport filter, history.
    pub fn ingest_remote(&mut self, snapshot: Snapshot) -> IngestOutcome {
        self.clock.observe(snapshot.timestamp, self.local_secs);
        if self.last_teleport.is_some_and(|at| snapshot.timestamp <= at) {
            debug!(
                entity = self.id.raw(),
                sub_index = self.sub_index.raw(),
                timestamp = snapshot.timestamp.millis(),
                "dropping snapshot from before teleport"
            );
            return IngestOutcome::BeforeTeleport;
        }

        self.playback.restart_lerping();
        match self.playback.ingest(snapshot, self.local_secs) {
            Ok(()) => IngestOutcome::Accepted,
            Err(HistoryError::OutOfOrder { newest, received }) => {
                warn!(
                    entity = self.id.raw(),
                    sub_index = self.sub_index.raw(),
                    newest = newest.millis(),
                    timestamp = received.millis(),
                    "received snapshot out of order"
                );
                IngestOutcome::OutOfOrder
            }
        }
    }

    /// Receiver tick: plays buffered snapshots back into the adapter.
    pub fn apply_playback(&mut self) -> PlaybackState {
        if self.owned {
            return PlaybackState::Idle;
        }
        let target_time =
            self.clock.now(self.local_secs) - self.config.interpolation_back_time_ms();
        self.playback.apply(
            &mut self.adapter,
            target_time,
            self.local_secs,
            &self.config,
            &self.motion,
        )
    }

    /// Moves the entity without interpolation.
    ///
    /// Call on the owner and on every receiver with the owner's timestamp.
    /// Snapshots stamped at or before `timestamp` are ignored afterwards.
    pub fn teleport(&mut self, timestamp: Timestamp, position: Vec3, rotation: Quat) {
        self.last_teleport = Some(timestamp);
        let scale = self.adapter.local_state().scale;
        self.adapter.set_local_state(position, rotation, scale, true);
        self.playback.clear();
        self.playback.stop_lerping();
        debug!(
            entity = self.id.raw(),
            sub_index = self.sub_index.raw(),
            timestamp = timestamp.millis(),
            "teleport"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::StateAdapter;
    use codec::CodecError;
    use schema::{AxisMask, BodyParams, QuantitySync};

    fn owner() -> SyncedEntity<StateAdapter> {
        SyncedEntity::new(
            EntityId::new(1),
            SyncIndex::ROOT,
            SyncConfig::default(),
            MotionSource::LinearBody(BodyParams::default()),
            true,
            StateAdapter::default(),
        )
        .unwrap()
    }

    fn receiver() -> SyncedEntity<StateAdapter> {
        SyncedEntity::new(
            EntityId::new(1),
            SyncIndex::ROOT,
            SyncConfig::default(),
            MotionSource::None,
            false,
            StateAdapter::default(),
        )
        .unwrap()
    }

    fn snap(ts: u32, x: f32) -> Snapshot {
        Snapshot::from_state(Timestamp::from_millis(ts), &EntityState::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SyncConfig {
            send_rate: 0.0,
            ..SyncConfig::default()
        };
        let result = SyncedEntity::new(
            EntityId::new(1),
            SyncIndex::ROOT,
            config,
            MotionSource::None,
            true,
            StateAdapter::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn motion_source_normalizes_config() {
        let entity = receiver();
        assert!(!entity.config().velocity.is_enabled());
        assert!(!entity.config().angular_velocity.is_enabled());
    }

    #[test]
    fn owner_sends_first_tick_then_waits_for_interval() {
        let mut entity = owner();
        let limits = wire::Limits::default();
        let first = entity.produce_update(&limits).unwrap().unwrap();
        assert_eq!(first.mask, FieldMask::ALL);

        entity.adapter_mut().state.position = Vec3::splat(1.0);
        entity.advance(0.01);
        assert!(entity.produce_update(&limits).unwrap().is_none());

        entity.advance(0.03);
        let second = entity.produce_update(&limits).unwrap().unwrap();
        assert_eq!(second.mask, FieldMask::from_raw(FieldMask::POSITION));
    }

    #[test]
    fn nothing_changed_keeps_timer_running() {
        let mut entity = owner();
        let limits = wire::Limits::default();
        entity.produce_update(&limits).unwrap();
        entity.advance(0.05);
        assert!(entity.produce_update(&limits).unwrap().is_none());

        // The interval already elapsed, so a change now goes out at once.
        entity.adapter_mut().state.position = Vec3::X;
        entity.advance(0.001);
        assert!(entity.produce_update(&limits).unwrap().is_some());
    }

    #[test]
    fn force_send_bypasses_interval() {
        let mut entity = owner();
        let limits = wire::Limits::default();
        entity.produce_update(&limits).unwrap();
        entity.force_send_next();
        let update = entity.produce_update(&limits).unwrap().unwrap();
        assert_eq!(update.mask, FieldMask::ALL);
        assert!(entity.produce_update(&limits).unwrap().is_none());
    }

    #[test]
    fn force_with_nothing_enabled_is_dropped() {
        let config = SyncConfig {
            position: QuantitySync::disabled(),
            rotation: QuantitySync::disabled(),
            scale: QuantitySync::disabled(),
            ..SyncConfig::default()
        };
        let mut entity = SyncedEntity::new(
            EntityId::new(1),
            SyncIndex::ROOT,
            config,
            MotionSource::None,
            true,
            StateAdapter::default(),
        )
        .unwrap();
        entity.force_send_next();
        assert!(entity
            .produce_update(&wire::Limits::default())
            .unwrap()
            .is_none());
        assert!(!entity.change.is_forced());
    }

    #[test]
    fn negative_scale_never_reaches_history() {
        let config = SyncConfig {
            scale: QuantitySync::new(AxisMask::XYZ, false),
            ..SyncConfig::default()
        };
        let mut entity = SyncedEntity::new(
            EntityId::new(1),
            SyncIndex::ROOT,
            config,
            MotionSource::None,
            false,
            StateAdapter::default(),
        )
        .unwrap();
        let mut bytes = encode_message(
            EntityId::new(1),
            SyncIndex::ROOT,
            &snap(100, 0.0),
            FieldMask::from_raw(FieldMask::SCALE),
            entity.config(),
            &wire::Limits::default(),
        )
        .unwrap();
        let n = bytes.len();
        bytes[n - 12..n - 8].copy_from_slice(&(-2.0f32).to_le_bytes());

        let err = entity.decode(&bytes, &wire::Limits::default()).unwrap_err();
        assert_eq!(err, CodecError::NegativeScale);
        assert!(entity.playback().history().is_empty());
        entity.advance(0.1);
        entity.apply_playback();
        assert_eq!(entity.adapter().state.scale, Vec3::ONE);

        let mut sender = owner();
        sender.adapter_mut().state.scale = Vec3::new(-2.0, 1.0, 1.0);
        assert_eq!(
            sender.produce_update(&wire::Limits::default()).unwrap_err(),
            CodecError::NegativeScale
        );
    }

    #[test]
    fn non_owner_never_produces() {
        let mut entity = receiver();
        assert!(entity
            .produce_update(&wire::Limits::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_fills_omitted_from_newest_buffered() {
        let mut entity = receiver();
        entity.ingest_remote(Snapshot::from_state(
            Timestamp::from_millis(100),
            &EntityState {
                position: Vec3::new(4.0, 5.0, 6.0),
                scale: Vec3::splat(2.0),
                ..EntityState::default()
            },
        ));

        let mut sender = owner();
        sender.adapter_mut().state.scale = Vec3::splat(3.0);
        let bytes = encode_message(
            EntityId::new(1),
            SyncIndex::ROOT,
            &Snapshot::from_state(Timestamp::from_millis(200), &sender.adapter().state),
            FieldMask::from_raw(FieldMask::SCALE),
            entity.config(),
            &wire::Limits::default(),
        )
        .unwrap();
        let decoded = entity.decode(&bytes, &wire::Limits::default()).unwrap();
        assert_eq!(decoded.snapshot.position, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(decoded.snapshot.scale, Vec3::splat(3.0));
    }

    #[test]
    fn teleport_suppresses_stale_snapshots() {
        let mut entity = receiver();
        entity.teleport(Timestamp::from_millis(1000), Vec3::splat(5.0), Quat::IDENTITY);
        assert_eq!(entity.adapter().state.position, Vec3::splat(5.0));
        assert!(entity.adapter().last_write_was_teleport);

        assert_eq!(entity.ingest_remote(snap(900, 0.0)), IngestOutcome::BeforeTeleport);
        assert!(entity.playback().history().is_empty());
        assert_eq!(entity.ingest_remote(snap(1100, 0.0)), IngestOutcome::Accepted);
        assert_eq!(entity.playback().history().len(), 1);
    }

    #[test]
    fn out_of_order_is_reported() {
        let mut entity = receiver();
        entity.ingest_remote(snap(100, 0.0));
        entity.ingest_remote(snap(200, 0.0));
        assert_eq!(entity.ingest_remote(snap(150, 0.0)), IngestOutcome::OutOfOrder);
    }

    #[test]
    fn receiver_converges_on_owner_position() {
        let mut entity = receiver();
        entity.ingest_remote(snap(1000, 10.0));
        for _ in 0..60 {
            entity.advance(1.0 / 60.0);
            entity.apply_playback();
        }
        assert!((entity.adapter().state.position.x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn ownership_change_clears_history() {
        let mut entity = receiver();
        entity.ingest_remote(snap(100, 0.0));
        entity.set_ownership(true);
        assert!(entity.playback().history().is_empty());
        assert!(entity.is_owned());
        assert_eq!(entity.apply_playback(), PlaybackState::Idle);
    }
}
