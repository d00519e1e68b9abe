#![no_main]

use codec::{decode_message, EntityState, SnapshotHistory};
use libfuzzer_sys::fuzz_target;
use schema::{AxisMask, Quantity, QuantitySync, SyncConfig};

/// Layout chosen by the first five input bytes: axis mask plus compression.
fn config_from(layout: &[u8]) -> SyncConfig {
    let mut config = SyncConfig::default();
    for (quantity, byte) in Quantity::ALL.into_iter().zip(layout) {
        let sync = QuantitySync::new(AxisMask::from_bits(byte & 0b111), byte & 0b1000 != 0);
        match quantity {
            Quantity::Position => config.position = sync,
            Quantity::Rotation => config.rotation = sync,
            Quantity::Scale => config.scale = sync,
            Quantity::Velocity => config.velocity = sync,
            Quantity::AngularVelocity => config.angular_velocity = sync,
        }
    }
    config
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let (layout, rest) = data.split_at(5);
    let config = config_from(layout);
    let limits = wire::Limits::for_testing();
    let mut history = SnapshotHistory::for_config(&config);

    let mut idx = 0usize;
    while idx < rest.len() && idx < 4096 {
        let len = (rest[idx] as usize % 64).saturating_add(1);
        idx += 1;
        let end = (idx + len).min(rest.len());
        let frame = &rest[idx..end];
        idx = end;

        let fallback = history.newest().map_or_else(EntityState::default, |s| s.state());
        if let Ok(decoded) = decode_message(frame, &config, &limits, &fallback) {
            assert!(decoded.snapshot.is_finite());
            assert!(decoded.snapshot.scale.min_element() >= 0.0);
            let _ = history.ingest(decoded.snapshot);
        }
    }
});
