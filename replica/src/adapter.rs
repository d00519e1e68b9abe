//! Collaborator interfaces: the synced object and the network.

use codec::EntityState;
use glam::{Quat, Vec3};
use wire::{Channel, MessageKind};

/// Peer (connection) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

/// The real transform and body the sync core reads and drives.
pub trait EntityAdapter {
    /// Current position, rotation, scale and body velocities.
    fn local_state(&self) -> EntityState;

    /// Writes the transform. `is_teleport` is set for snaps so the host can
    /// skip its own smoothing.
    fn set_local_state(&mut self, position: Vec3, rotation: Quat, scale: Vec3, is_teleport: bool);

    /// Writes body velocities. Never called for entities without a body.
    fn set_velocities(&mut self, velocity: Vec3, angular_velocity: Vec3);
}

impl<T: EntityAdapter + ?Sized> EntityAdapter for Box<T> {
    fn local_state(&self) -> EntityState {
        (**self).local_state()
    }

    fn set_local_state(&mut self, position: Vec3, rotation: Quat, scale: Vec3, is_teleport: bool) {
        (**self).set_local_state(position, rotation, scale, is_teleport);
    }

    fn set_velocities(&mut self, velocity: Vec3, angular_velocity: Vec3) {
        (**self).set_velocities(velocity, angular_velocity);
    }
}

/// A plain in-memory entity, handy for headless peers and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateAdapter {
    pub state: EntityState,
    /// Whether the last transform write was a snap.
    pub last_write_was_teleport: bool,
}

impl StateAdapter {
    #[must_use]
    pub fn new(state: EntityState) -> Self {
        Self {
            state,
            last_write_was_teleport: false,
        }
    }
}

impl EntityAdapter for StateAdapter {
    fn local_state(&self) -> EntityState {
        self.state
    }

    fn set_local_state(&mut self, position: Vec3, rotation: Quat, scale: Vec3, is_teleport: bool) {
        self.state.position = position;
        self.state.rotation = rotation;
        self.state.scale = scale;
        self.last_write_was_teleport = is_teleport;
    }

    fn set_velocities(&mut self, velocity: Vec3, angular_velocity: Vec3) {
        self.state.velocity = velocity;
        self.state.angular_velocity = angular_velocity;
    }
}

/// Outgoing side of the network.
///
/// Delivery is best effort; the core never waits for an acknowledgement.
pub trait Transport {
    fn send(&mut self, to: PeerId, kind: MessageKind, channel: Channel, bytes: &[u8]);
}

/// A transport that queues messages, for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    pub sent: Vec<OutgoingMessage>,
}

/// One queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: PeerId,
    pub kind: MessageKind,
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything queued so far.
    pub fn drain(&mut self) -> Vec<OutgoingMessage> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for Outbox {
    fn send(&mut self, to: PeerId, kind: MessageKind, channel: Channel, bytes: &[u8]) {
        self.sent.push(OutgoingMessage {
            to,
            kind,
            channel,
            bytes: bytes.to_vec(),
        });
    }
}
