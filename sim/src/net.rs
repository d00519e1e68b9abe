//! Deterministic unreliable network between simulated peers.

use replica::{PeerId, Transport};
use wire::{Channel, MessageKind};

/// Linear congruential generator; same seed, same run.
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn chance(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    /// Uniform in `[min, max]`.
    pub fn range_u32(&mut self, min: u32, max: u32) -> u32 {
        let span = max.saturating_sub(min).saturating_add(1);
        min + self.next_u32() % span
    }
}

#[derive(Debug, Clone)]
pub struct Datagram {
    pub from: PeerId,
    pub to: PeerId,
    pub kind: MessageKind,
    pub bytes: Vec<u8>,
}

struct InFlight {
    deliver_at: u32,
    seq: u64,
    datagram: Datagram,
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelModel {
    /// Probability a datagram is dropped.
    pub loss: f32,
    /// Probability a datagram is held back by extra ticks.
    pub reorder: f32,
    pub max_extra_delay: u32,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ChannelStats {
    pub sent: u64,
    pub dropped: u64,
    pub delayed: u64,
    pub delivered: u64,
    pub bytes_sent: u64,
}

/// Every datagram takes one tick; some are dropped, some take longer.
pub struct LossyChannel {
    model: ChannelModel,
    rng: Rng,
    tick: u32,
    next_seq: u64,
    in_flight: Vec<InFlight>,
    stats: ChannelStats,
}

impl LossyChannel {
    pub fn new(model: ChannelModel, seed: u64) -> Self {
        Self {
            model,
            rng: Rng::new(seed),
            tick: 0,
            next_seq: 0,
            in_flight: Vec::new(),
            stats: ChannelStats::default(),
        }
    }

    pub const fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
    }

    /// Sending side bound to `from` for one batch of sends.
    pub fn endpoint(&mut self, from: PeerId) -> Endpoint<'_> {
        Endpoint {
            channel: self,
            from,
        }
    }

    fn push(&mut self, datagram: Datagram) {
        self.stats.sent += 1;
        self.stats.bytes_sent += datagram.bytes.len() as u64;
        if self.rng.chance(self.model.loss) {
            self.stats.dropped += 1;
            return;
        }
        let mut deliver_at = self.tick + 1;
        if self.model.max_extra_delay > 0 && self.rng.chance(self.model.reorder) {
            deliver_at += self.rng.range_u32(1, self.model.max_extra_delay);
            self.stats.delayed += 1;
        }
        self.in_flight.push(InFlight {
            deliver_at,
            seq: self.next_seq,
            datagram,
        });
        self.next_seq += 1;
    }

    /// Datagrams due at the current tick, in arrival order.
    pub fn take_due(&mut self) -> Vec<Datagram> {
        let tick = self.tick;
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|f| f.deliver_at <= tick);
        self.in_flight = waiting;
        due.sort_by_key(|f| (f.deliver_at, f.seq));
        self.stats.delivered += due.len() as u64;
        due.into_iter().map(|f| f.datagram).collect()
    }
}

pub struct Endpoint<'a> {
    channel: &'a mut LossyChannel,
    from: PeerId,
}

impl Transport for Endpoint<'_> {
    fn send(&mut self, to: PeerId, kind: MessageKind, _channel: Channel, bytes: &[u8]) {
        self.channel.push(Datagram {
            from: self.from,
            to,
            kind,
            bytes: bytes.to_vec(),
        });
    }
}
