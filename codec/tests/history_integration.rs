use std::num::NonZeroUsize;

use codec::{EntityState, HistoryError, Snapshot, SnapshotHistory, Timestamp};
use glam::Vec3;
use proptest::prelude::*;

fn snap(ts: u32) -> Snapshot {
    Snapshot::from_state(Timestamp::from_millis(ts), &EntityState::at(Vec3::splat(ts as f32)))
}

#[test]
fn reordered_stream_keeps_newest_first_order() {
    let mut history = SnapshotHistory::new(NonZeroUsize::new(8).unwrap());
    let arrivals = [100, 200, 150, 300, 250, 400];
    let accepted: Vec<u32> = arrivals
        .iter()
        .copied()
        .filter(|&ts| history.ingest(snap(ts)).is_ok())
        .collect();
    assert_eq!(accepted, vec![100, 200, 300, 400]);
    let order: Vec<u32> = history.iter().map(|s| s.timestamp.millis()).collect();
    assert_eq!(order, vec![400, 300, 200, 100]);
}

#[test]
fn rejected_snapshot_reports_both_timestamps() {
    let mut history = SnapshotHistory::new(NonZeroUsize::new(4).unwrap());
    history.ingest(snap(10)).unwrap();
    history.ingest(snap(20)).unwrap();
    let err = history.ingest(snap(5)).unwrap_err();
    assert_eq!(err.to_string(), "snapshot at 5 ms is older than newest buffered 20 ms");
    assert!(matches!(err, HistoryError::OutOfOrder { .. }));
}

proptest! {
    #[test]
    fn prop_ingest_matches_model(
        cap in 1usize..12,
        stamps in prop::collection::vec(0u32..1000, 0..64),
    ) {
        let mut history = SnapshotHistory::new(NonZeroUsize::new(cap).unwrap());
        let mut model: Vec<u32> = Vec::new();

        for ts in stamps {
            let should_reject = model.len() > 1 && ts < model[0];
            let result = history.ingest(snap(ts));
            prop_assert_eq!(result.is_err(), should_reject);
            if !should_reject {
                model.insert(0, ts);
                model.truncate(cap);
            }
            prop_assert!(history.len() <= cap);
        }

        let order: Vec<u32> = history.iter().map(|s| s.timestamp.millis()).collect();
        prop_assert_eq!(order, model);
    }
}
