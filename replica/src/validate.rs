//! Authority-side acceptance of owner states.

use codec::Snapshot;

/// Decides whether the authority accepts a state received from an owner.
///
/// Only called once a previous state has been accepted; the first state
/// from an owner is always taken. A rejected state is neither applied on
/// the authority nor relayed.
pub trait StateValidator {
    fn validate(&self, candidate: &Snapshot, last_accepted: &Snapshot) -> bool;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl StateValidator for AcceptAll {
    fn validate(&self, _candidate: &Snapshot, _last_accepted: &Snapshot) -> bool {
        true
    }
}

/// Rejects a jump of more than `max_distance` units within `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxDisplacement {
    pub max_distance: f32,
    pub window_ms: i64,
}

impl Default for MaxDisplacement {
    fn default() -> Self {
        Self {
            max_distance: 9000.0,
            window_ms: 500,
        }
    }
}

impl StateValidator for MaxDisplacement {
    fn validate(&self, candidate: &Snapshot, last_accepted: &Snapshot) -> bool {
        let moved = candidate.position.distance(last_accepted.position);
        let elapsed = candidate.timestamp.as_i64() - last_accepted.timestamp.as_i64();
        !(moved > self.max_distance && elapsed < self.window_ms)
    }
}

impl<F> StateValidator for F
where
    F: Fn(&Snapshot, &Snapshot) -> bool,
{
    fn validate(&self, candidate: &Snapshot, last_accepted: &Snapshot) -> bool {
        self(candidate, last_accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::{EntityState, Timestamp};
    use glam::Vec3;

    fn snap(ts: u32, x: f32) -> Snapshot {
        Snapshot::from_state(Timestamp::from_millis(ts), &EntityState::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn accept_all() {
        assert!(AcceptAll.validate(&snap(0, 1e9), &snap(0, 0.0)));
    }

    #[test]
    fn max_displacement_rejects_fast_jumps() {
        let v = MaxDisplacement::default();
        assert!(!v.validate(&snap(100, 9001.0), &snap(0, 0.0)));
        assert!(v.validate(&snap(600, 9001.0), &snap(0, 0.0)));
        assert!(v.validate(&snap(100, 8999.0), &snap(0, 0.0)));
    }

    #[test]
    fn closures_validate() {
        let only_forward = |c: &Snapshot, l: &Snapshot| c.position.x >= l.position.x;
        assert!(only_forward.validate(&snap(1, 2.0), &snap(0, 1.0)));
        assert!(!only_forward.validate(&snap(1, 0.0), &snap(0, 1.0)));
    }
}
