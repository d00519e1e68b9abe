//! Entity registry, message dispatch and host relay.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use codec::{CodecError, EntityId, Snapshot, SyncIndex};
use schema::{MotionSource, SchemaResult, SyncConfig};
use tracing::{debug, warn};
use wire::MessageKind;

use crate::adapter::{EntityAdapter, PeerId, Transport};
use crate::entity::{IngestOutcome, SyncedEntity};
use crate::playback::PlaybackState;
use crate::validate::{AcceptAll, StateValidator};

/// Which side of the host/client split this peer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetRole {
    /// Authority: validates owner updates and relays them.
    Host,
    /// Sends owned updates to `server`, receives relayed ones.
    Client { server: PeerId },
}

/// Message kinds with an installed handler.
///
/// Installing a kind twice is a no-op, so entities may each ask for their
/// handler during setup.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    installed: HashSet<MessageKind>,
}

impl HandlerTable {
    /// Returns `true` if `kind` was not installed before.
    pub fn install(&mut self, kind: MessageKind) -> bool {
        let fresh = self.installed.insert(kind);
        if fresh {
            debug!(%kind, "installed message handler");
        }
        fresh
    }

    #[must_use]
    pub fn is_installed(&self, kind: MessageKind) -> bool {
        self.installed.contains(&kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.installed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

/// Result of handling one received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Handed to the target entity; `relayed` copies went out to observers.
    Delivered {
        ingest: Option<IngestOutcome>,
        relayed: usize,
    },
    /// No handler for this message kind on this peer.
    KindNotInstalled,
    Malformed(CodecError),
    UnknownTarget { entity: EntityId, sub_index: SyncIndex },
    /// Sender does not own the entity.
    NotAuthorized,
    /// The validator refused the state.
    Rejected,
    /// A relayed update for an entity this peer owns.
    IgnoredOwned,
}

/// Totals for one [`SyncRegistry::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub messages_sent: usize,
    pub bytes_sent: usize,
    pub interpolating: usize,
    pub extrapolating: usize,
    pub clamped: usize,
}

struct Entry {
    entity: SyncedEntity<Box<dyn EntityAdapter>>,
    owner: PeerId,
    validator: Box<dyn StateValidator>,
    last_validated: Option<Snapshot>,
}

#[derive(Debug, Clone, Copy)]
struct PeerEntry {
    ready: bool,
}

/// All synced entities of one peer, keyed by entity id and sub-object index.
pub struct SyncRegistry {
    role: NetRole,
    local: PeerId,
    limits: wire::Limits,
    handlers: HandlerTable,
    entries: BTreeMap<(EntityId, SyncIndex), Entry>,
    peers: BTreeMap<PeerId, PeerEntry>,
    /// (peer, entity) pairs excluded from relay and broadcast.
    hidden: BTreeSet<(PeerId, EntityId)>,
}

impl SyncRegistry {
    #[must_use]
    pub fn new(role: NetRole, local: PeerId, limits: wire::Limits) -> Self {
        Self {
            role,
            local,
            limits,
            handlers: HandlerTable::default(),
            entries: BTreeMap::new(),
            peers: BTreeMap::new(),
            hidden: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> NetRole {
        self.role
    }

    #[must_use]
    pub const fn local_peer(&self) -> PeerId {
        self.local
    }

    #[must_use]
    pub const fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Adds a synced entity owned by `owner`.
    ///
    /// Replaces any entity already registered under the same key.
    pub fn register(
        &mut self,
        id: EntityId,
        sub_index: SyncIndex,
        config: SyncConfig,
        motion: MotionSource,
        owner: PeerId,
        adapter: Box<dyn EntityAdapter>,
    ) -> SchemaResult<()> {
        let entity = SyncedEntity::new(
            id,
            sub_index,
            config,
            motion,
            owner == self.local,
            adapter,
        )?;
        match self.role {
            NetRole::Host => {
                self.handlers.install(MessageKind::OwnerToServer);
            }
            NetRole::Client { .. } => {
                self.handlers.install(MessageKind::ServerToNonOwners);
            }
        }
        self.entries.insert(
            (id, sub_index),
            Entry {
                entity,
                owner,
                validator: Box::new(AcceptAll),
                last_validated: None,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, id: EntityId, sub_index: SyncIndex) -> bool {
        self.entries.remove(&(id, sub_index)).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entity(
        &self,
        id: EntityId,
        sub_index: SyncIndex,
    ) -> Option<&SyncedEntity<Box<dyn EntityAdapter>>> {
        self.entries.get(&(id, sub_index)).map(|e| &e.entity)
    }

    pub fn entity_mut(
        &mut self,
        id: EntityId,
        sub_index: SyncIndex,
    ) -> Option<&mut SyncedEntity<Box<dyn EntityAdapter>>> {
        self.entries.get_mut(&(id, sub_index)).map(|e| &mut e.entity)
    }

    /// Installs the authority-side validator for one entity.
    pub fn set_validator(
        &mut self,
        id: EntityId,
        sub_index: SyncIndex,
        validator: impl StateValidator + 'static,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&(id, sub_index)) else {
            return false;
        };
        entry.validator = Box::new(validator);
        true
    }

    /// Hands an entity to another peer.
    pub fn set_owner(&mut self, id: EntityId, sub_index: SyncIndex, owner: PeerId) -> bool {
        let local = self.local;
        let Some(entry) = self.entries.get_mut(&(id, sub_index)) else {
            return false;
        };
        entry.owner = owner;
        entry.last_validated = None;
        entry.entity.set_ownership(owner == local);
        true
    }

    #[must_use]
    pub fn owner(&self, id: EntityId, sub_index: SyncIndex) -> Option<PeerId> {
        self.entries.get(&(id, sub_index)).map(|e| e.owner)
    }

    /// Adds a connection. New peers are ready and observe everything.
    pub fn connect_peer(&mut self, peer: PeerId) {
        self.peers.insert(peer, PeerEntry { ready: true });
    }

    pub fn disconnect_peer(&mut self, peer: PeerId) {
        self.peers.remove(&peer);
        self.hidden.retain(|(p, _)| *p != peer);
    }

    /// Peers that are not ready receive nothing.
    pub fn set_peer_ready(&mut self, peer: PeerId, ready: bool) {
        if let Some(entry) = self.peers.get_mut(&peer) {
            entry.ready = ready;
        }
    }

    /// Interest management: whether `peer` should receive `entity` updates.
    pub fn set_observing(&mut self, peer: PeerId, entity: EntityId, observing: bool) {
        if observing {
            self.hidden.remove(&(peer, entity));
        } else {
            self.hidden.insert((peer, entity));
        }
    }

    #[must_use]
    pub fn is_observing(&self, peer: PeerId, entity: EntityId) -> bool {
        !self.hidden.contains(&(peer, entity))
    }

    /// Peers that should receive a host-side update of `entity`.
    fn recipients(&self, entity: EntityId, owner: PeerId) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(peer, info)| {
                info.ready
                    && **peer != owner
                    && **peer != self.local
                    && self.is_observing(**peer, entity)
            })
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// Advances every entity by `dt` seconds: owners send, receivers play back.
    pub fn update(&mut self, dt: f64, transport: &mut dyn Transport) -> TickReport {
        let mut report = TickReport::default();
        let limits = self.limits.clone();
        let keys: Vec<_> = self.entries.keys().copied().collect();
        for key in keys {
            let Some(entry) = self.entries.get_mut(&key) else {
                continue;
            };
            entry.entity.advance(dt);
            if !entry.entity.is_owned() {
                match entry.entity.apply_playback() {
                    PlaybackState::Interpolating => report.interpolating += 1,
                    PlaybackState::Extrapolating => report.extrapolating += 1,
                    PlaybackState::ExtrapolationClamped => report.clamped += 1,
                    PlaybackState::Idle | PlaybackState::Frozen => {}
                }
                continue;
            }

            let update = match entry.entity.produce_update(&limits) {
                Ok(Some(update)) => update,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        entity = key.0.raw(),
                        sub_index = key.1.raw(),
                        %err,
                        "failed to encode update"
                    );
                    continue;
                }
            };
            let channel = entry.entity.channel();
            let owner = entry.owner;

            match self.role {
                NetRole::Host => {
                    for peer in self.recipients(key.0, owner) {
                        transport.send(
                            peer,
                            MessageKind::ServerToNonOwners,
                            channel,
                            &update.bytes,
                        );
                        report.messages_sent += 1;
                        report.bytes_sent += update.bytes.len();
                    }
                }
                NetRole::Client { server } => {
                    transport.send(server, MessageKind::OwnerToServer, channel, &update.bytes);
                    report.messages_sent += 1;
                    report.bytes_sent += update.bytes.len();
                }
            }
        }
        report
    }

    /// Dispatches a message received from `from`.
    pub fn on_receive(
        &mut self,
        from: PeerId,
        kind: MessageKind,
        bytes: &[u8],
        transport: &mut dyn Transport,
    ) -> ReceiveOutcome {
        if !self.handlers.is_installed(kind) {
            warn!(%kind, from = from.0, "no handler installed for message kind");
            return ReceiveOutcome::KindNotInstalled;
        }

        let (entity, sub_index) = match wire::peek_target(bytes, &self.limits) {
            Ok((entity, sub_index)) => (EntityId::new(entity), SyncIndex::new(sub_index)),
            Err(err) => {
                warn!(from = from.0, %err, "malformed message");
                return ReceiveOutcome::Malformed(err.into());
            }
        };
        let Some(entry) = self.entries.get(&(entity, sub_index)) else {
            warn!(
                entity = entity.raw(),
                sub_index = sub_index.raw(),
                "no synced entity for message"
            );
            return ReceiveOutcome::UnknownTarget { entity, sub_index };
        };

        let decoded = match entry.entity.decode(bytes, &self.limits) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(
                    entity = entity.raw(),
                    sub_index = sub_index.raw(),
                    %err,
                    "malformed message"
                );
                return ReceiveOutcome::Malformed(err);
            }
        };

        match kind {
            MessageKind::ServerToNonOwners => {
                let Some(entry) = self.entries.get_mut(&(entity, sub_index)) else {
                    return ReceiveOutcome::UnknownTarget { entity, sub_index };
                };
                if entry.entity.is_owned() {
                    return ReceiveOutcome::IgnoredOwned;
                }
                let ingest = entry.entity.ingest_remote(decoded.snapshot);
                ReceiveOutcome::Delivered {
                    ingest: Some(ingest),
                    relayed: 0,
                }
            }
            MessageKind::OwnerToServer => {
                if entry.owner != from {
                    warn!(
                        entity = entity.raw(),
                        sub_index = sub_index.raw(),
                        from = from.0,
                        owner = entry.owner.0,
                        "update from a peer that does not own the entity"
                    );
                    return ReceiveOutcome::NotAuthorized;
                }
                if let Some(last) = &entry.last_validated {
                    if !entry.validator.validate(&decoded.snapshot, last) {
                        warn!(
                            entity = entity.raw(),
                            sub_index = sub_index.raw(),
                            timestamp = decoded.snapshot.timestamp.millis(),
                            "validator rejected state"
                        );
                        return ReceiveOutcome::Rejected;
                    }
                }

                let recipients = self.recipients(entity, from);
                let Some(entry) = self.entries.get_mut(&(entity, sub_index)) else {
                    return ReceiveOutcome::UnknownTarget { entity, sub_index };
                };
                entry.last_validated = Some(decoded.snapshot);

                // The body layout is shared, so the owner's bytes carry exactly
                // the quantities that arrived.
                let channel = entry.entity.channel();
                for peer in &recipients {
                    transport.send(*peer, MessageKind::ServerToNonOwners, channel, bytes);
                }

                let ingest = (!entry.entity.is_owned())
                    .then(|| entry.entity.ingest_remote(decoded.snapshot));
                ReceiveOutcome::Delivered {
                    ingest,
                    relayed: recipients.len(),
                }
            }
        }
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("role", &self.role)
            .field("local", &self.local)
            .field("entities", &self.entries.len())
            .field("peers", &self.peers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Outbox, StateAdapter};
    use codec::{encode_message, EntityState, Timestamp};
    use glam::Vec3;
    use wire::FieldMask;

    const HOST: PeerId = PeerId(0);
    const ALICE: PeerId = PeerId(1);
    const BOB: PeerId = PeerId(2);

    fn host_with_client_entity() -> SyncRegistry {
        let mut host = SyncRegistry::new(NetRole::Host, HOST, wire::Limits::default());
        host.connect_peer(ALICE);
        host.connect_peer(BOB);
        host.register(
            EntityId::new(10),
            SyncIndex::ROOT,
            SyncConfig::default(),
            MotionSource::None,
            ALICE,
            Box::new(StateAdapter::default()),
        )
        .unwrap();
        host
    }

    fn update_bytes(ts: u32, x: f32) -> Vec<u8> {
        let snapshot = Snapshot::from_state(
            Timestamp::from_millis(ts),
            &EntityState::at(Vec3::new(x, 0.0, 0.0)),
        );
        encode_message(
            EntityId::new(10),
            SyncIndex::ROOT,
            &snapshot,
            FieldMask::from_raw(FieldMask::POSITION),
            &SyncConfig::default(),
            &wire::Limits::default(),
        )
        .unwrap()
    }

    #[test]
    fn handler_install_is_idempotent() {
        let mut table = HandlerTable::default();
        assert!(table.install(MessageKind::OwnerToServer));
        assert!(!table.install(MessageKind::OwnerToServer));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn registering_many_entities_installs_once() {
        let mut host = host_with_client_entity();
        host.register(
            EntityId::new(11),
            SyncIndex::ROOT,
            SyncConfig::default(),
            MotionSource::None,
            BOB,
            Box::new(StateAdapter::default()),
        )
        .unwrap();
        assert_eq!(host.handlers().len(), 1);
        assert!(host.handlers().is_installed(MessageKind::OwnerToServer));
        assert!(!host.handlers().is_installed(MessageKind::ServerToNonOwners));
    }

    #[test]
    fn host_relays_owner_update_to_other_peers() {
        let mut host = host_with_client_entity();
        let mut outbox = Outbox::new();
        let bytes = update_bytes(100, 1.0);
        let outcome = host.on_receive(ALICE, MessageKind::OwnerToServer, &bytes, &mut outbox);
        assert_eq!(
            outcome,
            ReceiveOutcome::Delivered {
                ingest: Some(IngestOutcome::Accepted),
                relayed: 1
            }
        );
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, BOB);
        assert_eq!(sent[0].kind, MessageKind::ServerToNonOwners);
        assert_eq!(sent[0].bytes, bytes);
    }

    #[test]
    fn relay_skips_hidden_and_unready_peers() {
        let mut host = host_with_client_entity();
        host.connect_peer(PeerId(3));
        host.set_observing(BOB, EntityId::new(10), false);
        host.set_peer_ready(PeerId(3), false);
        let mut outbox = Outbox::new();
        host.on_receive(
            ALICE,
            MessageKind::OwnerToServer,
            &update_bytes(100, 1.0),
            &mut outbox,
        );
        assert!(outbox.sent.is_empty());
    }

    #[test]
    fn non_owner_update_is_refused() {
        let mut host = host_with_client_entity();
        let mut outbox = Outbox::new();
        let outcome = host.on_receive(
            BOB,
            MessageKind::OwnerToServer,
            &update_bytes(100, 1.0),
            &mut outbox,
        );
        assert_eq!(outcome, ReceiveOutcome::NotAuthorized);
        assert!(outbox.sent.is_empty());
    }

    #[test]
    fn validator_rejection_blocks_apply_and_relay() {
        let mut host = host_with_client_entity();
        host.set_validator(
            EntityId::new(10),
            SyncIndex::ROOT,
            crate::MaxDisplacement::default(),
        );
        let mut outbox = Outbox::new();

        // The first state is always accepted.
        host.on_receive(
            ALICE,
            MessageKind::OwnerToServer,
            &update_bytes(100, 0.0),
            &mut outbox,
        );
        outbox.drain();

        let outcome = host.on_receive(
            ALICE,
            MessageKind::OwnerToServer,
            &update_bytes(200, 20_000.0),
            &mut outbox,
        );
        assert_eq!(outcome, ReceiveOutcome::Rejected);
        assert!(outbox.sent.is_empty());
        let entity = host.entity(EntityId::new(10), SyncIndex::ROOT).unwrap();
        assert_eq!(entity.playback().history().len(), 1);
    }

    #[test]
    fn unknown_target_is_reported() {
        let mut host = host_with_client_entity();
        let snapshot = Snapshot::from_state(Timestamp::from_millis(1), &EntityState::default());
        let bytes = encode_message(
            EntityId::new(99),
            SyncIndex::ROOT,
            &snapshot,
            FieldMask::EMPTY,
            &SyncConfig::default(),
            &wire::Limits::default(),
        )
        .unwrap();
        let outcome =
            host.on_receive(ALICE, MessageKind::OwnerToServer, &bytes, &mut Outbox::new());
        assert_eq!(
            outcome,
            ReceiveOutcome::UnknownTarget {
                entity: EntityId::new(99),
                sub_index: SyncIndex::ROOT
            }
        );
    }

    #[test]
    fn uninstalled_kind_is_dropped() {
        let mut host = host_with_client_entity();
        let outcome = host.on_receive(
            ALICE,
            MessageKind::ServerToNonOwners,
            &update_bytes(1, 0.0),
            &mut Outbox::new(),
        );
        assert_eq!(outcome, ReceiveOutcome::KindNotInstalled);
    }

    #[test]
    fn truncated_message_is_malformed() {
        let mut host = host_with_client_entity();
        let mut bytes = update_bytes(1, 0.0);
        bytes.truncate(bytes.len() - 1);
        let outcome =
            host.on_receive(ALICE, MessageKind::OwnerToServer, &bytes, &mut Outbox::new());
        assert!(matches!(
            outcome,
            ReceiveOutcome::Malformed(CodecError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn host_owned_entity_broadcasts() {
        let mut host = SyncRegistry::new(NetRole::Host, HOST, wire::Limits::default());
        host.connect_peer(ALICE);
        host.connect_peer(BOB);
        host.register(
            EntityId::new(1),
            SyncIndex::ROOT,
            SyncConfig::default(),
            MotionSource::None,
            HOST,
            Box::new(StateAdapter::default()),
        )
        .unwrap();
        let mut outbox = Outbox::new();
        let report = host.update(0.016, &mut outbox);
        assert_eq!(report.messages_sent, 2);
        let recipients: Vec<_> = outbox.sent.iter().map(|m| m.to).collect();
        assert_eq!(recipients, vec![ALICE, BOB]);
    }

    #[test]
    fn client_owned_entity_sends_to_server() {
        let mut client = SyncRegistry::new(
            NetRole::Client { server: HOST },
            ALICE,
            wire::Limits::default(),
        );
        client
            .register(
                EntityId::new(1),
                SyncIndex::ROOT,
                SyncConfig::default(),
                MotionSource::None,
                ALICE,
                Box::new(StateAdapter::default()),
            )
            .unwrap();
        let mut outbox = Outbox::new();
        client.update(0.016, &mut outbox);
        assert_eq!(outbox.sent.len(), 1);
        assert_eq!(outbox.sent[0].to, HOST);
        assert_eq!(outbox.sent[0].kind, MessageKind::OwnerToServer);
    }

    #[test]
    fn ownership_transfer_resets_validation() {
        let mut host = host_with_client_entity();
        assert!(host.set_owner(EntityId::new(10), SyncIndex::ROOT, BOB));
        assert_eq!(host.owner(EntityId::new(10), SyncIndex::ROOT), Some(BOB));
        let outcome = host.on_receive(
            ALICE,
            MessageKind::OwnerToServer,
            &update_bytes(1, 0.0),
            &mut Outbox::new(),
        );
        assert_eq!(outcome, ReceiveOutcome::NotAuthorized);
    }
}
