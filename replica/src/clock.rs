//! Estimated owner clock.

use codec::Timestamp;
use tracing::debug;

/// Tracks the owner's clock from the timestamps on received messages.
///
/// Between observations the estimate advances with local time. Small and
/// very large disagreements are corrected at once; anything in between is
/// nudged by at most one correction step per observation.
#[derive(Debug, Clone)]
pub struct ClockReconciler {
    estimated_ms: i64,
    reference_secs: f64,
    correction_step_ms: i64,
    observed: bool,
}

impl ClockReconciler {
    #[must_use]
    pub fn new(correction_step_ms: u32) -> Self {
        Self {
            estimated_ms: 0,
            reference_secs: 0.0,
            correction_step_ms: i64::from(correction_step_ms.max(1)),
            observed: false,
        }
    }

    /// Estimated owner time in milliseconds at local time `local_secs`.
    #[must_use]
    pub fn now(&self, local_secs: f64) -> i64 {
        let elapsed_ms = ((local_secs - self.reference_secs) * 1000.0) as i64;
        self.estimated_ms + elapsed_ms
    }

    /// Folds in an owner timestamp received at local time `local_secs`.
    pub fn observe(&mut self, remote: Timestamp, local_secs: f64) {
        let remote = remote.as_i64();
        let current = self.now(local_secs);
        let delta = (current - remote).abs();
        let step = self.correction_step_ms;

        self.estimated_ms = if !self.observed || delta < step || delta > step * 10 {
            if self.observed && delta > step * 10 {
                debug!(estimated = current, remote, "owner clock jumped");
            }
            remote
        } else if current < remote {
            current + step
        } else {
            current - step
        };
        self.reference_secs = local_secs;
        self.observed = true;
    }

    /// Whether any timestamp has been observed since the last reset.
    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        self.observed
    }

    /// Forgets the estimate; the next observation is taken as-is.
    pub fn reset(&mut self) {
        self.estimated_ms = 0;
        self.reference_secs = 0.0;
        self.observed = false;
    }
}
