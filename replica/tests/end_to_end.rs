//! Owner -> host -> observer runs over an in-memory network.

use codec::{encode_message, EntityId, EntityState, Snapshot, SyncIndex, Timestamp};
use glam::{Quat, Vec3};
use replica::{
    EntityAdapter, MaxDisplacement, NetRole, Outbox, PeerId, ReceiveOutcome, StateAdapter,
    SyncRegistry, TickReport,
};
use schema::{MotionSource, SyncConfig};
use wire::{FieldMask, MessageKind};

const HOST: PeerId = PeerId(0);
const ALICE: PeerId = PeerId(1);
const BOB: PeerId = PeerId(2);
const DT: f64 = 0.02;
const SHIP: EntityId = EntityId::new(7);
const TURRET: SyncIndex = SyncIndex::new(1);

struct Network {
    host: SyncRegistry,
    alice: SyncRegistry,
    bob: SyncRegistry,
    bob_report: TickReport,
    relayed: usize,
}

impl Network {
    /// Host plus two clients; every peer knows `SHIP` (root and turret),
    /// owned by Alice.
    fn new() -> Self {
        let mut host = SyncRegistry::new(NetRole::Host, HOST, wire::Limits::default());
        host.connect_peer(ALICE);
        host.connect_peer(BOB);
        let client = NetRole::Client { server: HOST };
        let mut alice = SyncRegistry::new(client, ALICE, wire::Limits::default());
        let mut bob = SyncRegistry::new(client, BOB, wire::Limits::default());
        for registry in [&mut host, &mut alice, &mut bob] {
            for sub_index in [SyncIndex::ROOT, TURRET] {
                registry
                    .register(
                        SHIP,
                        sub_index,
                        SyncConfig::default(),
                        MotionSource::None,
                        ALICE,
                        Box::new(StateAdapter::default()),
                    )
                    .unwrap();
            }
        }
        Self {
            host,
            alice,
            bob,
            bob_report: TickReport::default(),
            relayed: 0,
        }
    }

    fn tick(&mut self) {
        let mut relay = Outbox::new();
        for (peer, registry) in [(ALICE, &mut self.alice), (BOB, &mut self.bob)] {
            let mut out = Outbox::new();
            let report = registry.update(DT, &mut out);
            if peer == BOB {
                self.bob_report = report;
            }
            for message in out.drain() {
                assert_eq!(message.to, HOST);
                self.host
                    .on_receive(peer, message.kind, &message.bytes, &mut relay);
            }
        }
        self.host.update(DT, &mut relay);
        for message in relay.drain() {
            self.relayed += 1;
            let target = match message.to {
                ALICE => &mut self.alice,
                BOB => &mut self.bob,
                other => panic!("unexpected recipient {other:?}"),
            };
            target.on_receive(HOST, message.kind, &message.bytes, &mut Outbox::new());
        }
    }

    fn move_to(registry: &mut SyncRegistry, sub_index: SyncIndex, position: Vec3) {
        registry
            .entity_mut(SHIP, sub_index)
            .unwrap()
            .adapter_mut()
            .set_local_state(position, Quat::IDENTITY, Vec3::ONE, false);
    }

    fn position(registry: &SyncRegistry, sub_index: SyncIndex) -> Vec3 {
        registry
            .entity(SHIP, sub_index)
            .unwrap()
            .adapter()
            .local_state()
            .position
    }
}

#[test]
fn observer_follows_owner_through_host() {
    let mut net = Network::new();
    let mut saw_interpolation = false;
    for step in 1..=30 {
        Network::move_to(
            &mut net.alice,
            SyncIndex::ROOT,
            Vec3::new(step as f32 * 0.1, 0.0, 0.0),
        );
        net.tick();
        saw_interpolation |= net.bob_report.interpolating > 0;
    }
    assert!(saw_interpolation);
    assert!(net.relayed > 0);

    for _ in 0..150 {
        net.tick();
    }
    let target = Network::position(&net.alice, SyncIndex::ROOT);
    let on_bob = Network::position(&net.bob, SyncIndex::ROOT);
    let on_host = Network::position(&net.host, SyncIndex::ROOT);
    assert!(on_bob.distance(target) < 0.01, "bob at {on_bob}, owner at {target}");
    assert!(on_host.distance(target) < 0.01, "host at {on_host}, owner at {target}");
}

#[test]
fn idle_owner_stops_sending() {
    let mut net = Network::new();
    net.tick();
    let after_first = net.relayed;
    assert!(after_first > 0);
    for _ in 0..50 {
        net.tick();
    }
    assert_eq!(net.relayed, after_first);
}

#[test]
fn sub_objects_sync_independently() {
    let mut net = Network::new();
    for _ in 0..5 {
        net.tick();
    }
    Network::move_to(&mut net.alice, TURRET, Vec3::new(0.0, 2.0, 0.0));
    for _ in 0..150 {
        net.tick();
    }
    assert!(Network::position(&net.bob, TURRET).distance(Vec3::new(0.0, 2.0, 0.0)) < 0.01);
    assert_eq!(Network::position(&net.bob, SyncIndex::ROOT), Vec3::ZERO);
}

#[test]
fn hidden_observer_receives_nothing() {
    let mut net = Network::new();
    net.host.set_observing(BOB, SHIP, false);
    Network::move_to(&mut net.alice, SyncIndex::ROOT, Vec3::new(1.0, 0.0, 0.0));
    for _ in 0..60 {
        net.tick();
    }
    assert_eq!(net.relayed, 0);
    assert_eq!(Network::position(&net.bob, SyncIndex::ROOT), Vec3::ZERO);
    assert!(Network::position(&net.host, SyncIndex::ROOT).distance(Vec3::X) < 0.01);
}

#[test]
fn ownership_handover_reverses_direction() {
    let mut net = Network::new();
    for _ in 0..5 {
        net.tick();
    }
    for registry in [&mut net.host, &mut net.alice, &mut net.bob] {
        assert!(registry.set_owner(SHIP, SyncIndex::ROOT, BOB));
    }
    assert!(net.bob.entity(SHIP, SyncIndex::ROOT).unwrap().is_owned());
    assert!(!net.alice.entity(SHIP, SyncIndex::ROOT).unwrap().is_owned());

    Network::move_to(&mut net.bob, SyncIndex::ROOT, Vec3::new(0.0, 0.0, -2.0));
    for _ in 0..150 {
        net.tick();
    }
    let on_alice = Network::position(&net.alice, SyncIndex::ROOT);
    assert!(on_alice.distance(Vec3::new(0.0, 0.0, -2.0)) < 0.01, "alice at {on_alice}");

    let stale = Snapshot::from_state(
        Timestamp::from_millis(10_000),
        &EntityState::at(Vec3::new(5.0, 0.0, 0.0)),
    );
    let bytes = encode_message(
        SHIP,
        SyncIndex::ROOT,
        &stale,
        FieldMask::from_raw(FieldMask::POSITION),
        &SyncConfig::default(),
        &wire::Limits::default(),
    )
    .unwrap();
    let outcome = net
        .host
        .on_receive(ALICE, MessageKind::OwnerToServer, &bytes, &mut Outbox::new());
    assert_eq!(outcome, ReceiveOutcome::NotAuthorized);
}

#[test]
fn validator_stops_a_cheating_owner() {
    let mut net = Network::new();
    net.host
        .set_validator(SHIP, SyncIndex::ROOT, MaxDisplacement::default());
    for _ in 0..5 {
        net.tick();
    }
    let relayed_before = net.relayed;
    Network::move_to(
        &mut net.alice,
        SyncIndex::ROOT,
        Vec3::new(50_000.0, 0.0, 0.0),
    );
    for _ in 0..10 {
        net.tick();
    }
    assert_eq!(net.relayed, relayed_before);
    assert_eq!(Network::position(&net.bob, SyncIndex::ROOT), Vec3::ZERO);
    assert_eq!(Network::position(&net.host, SyncIndex::ROOT), Vec3::ZERO);
}
