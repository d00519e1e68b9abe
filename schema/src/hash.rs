//! Deterministic layout hashing.

use blake3::Hasher;

use crate::axis::Quantity;
use crate::config::SyncConfig;

/// Version tag mixed into every layout hash.
const LAYOUT_VERSION: u8 = 1;

/// Computes a deterministic hash of the wire layout a config implies.
///
/// Only axis masks and compression flags shape the message body, so two
/// peers agree on the layout exactly when their hashes match. Thresholds,
/// lerp speeds and timing are receiver-local and do not participate.
#[must_use]
pub fn layout_hash(config: &SyncConfig) -> u64 {
    let mut hasher = Hasher::new();
    write_u8(&mut hasher, LAYOUT_VERSION);
    for quantity in Quantity::ALL {
        let sync = config.sync(quantity);
        write_u8(&mut hasher, quantity.bit());
        write_u8(&mut hasher, sync.axes.bits());
        write_u8(&mut hasher, u8::from(sync.compressed));
    }

    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}
