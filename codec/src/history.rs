//! Fixed-capacity, newest-first snapshot history.

use std::num::NonZeroUsize;

use schema::SyncConfig;

use crate::error::HistoryError;
use crate::snapshot::Snapshot;

/// A ring buffer of received snapshots, indexed newest-first.
///
/// Index 0 is the most recently ingested snapshot. Once at least two
/// entries are buffered, a snapshot older than the newest is dropped
/// instead of being inserted in order.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    entries: Vec<Option<Snapshot>>,
    /// Slot of the newest entry.
    head: usize,
    len: usize,
}

impl SnapshotHistory {
    /// Creates an empty history with the given capacity.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        let cap = capacity.get();
        let mut entries = Vec::with_capacity(cap);
        entries.resize_with(cap, || None);
        Self {
            entries,
            head: 0,
            len: 0,
        }
    }

    /// Creates an empty history sized by [`SyncConfig::history_capacity`].
    #[must_use]
    pub fn for_config(config: &SyncConfig) -> Self {
        let capacity = NonZeroUsize::new(config.history_capacity()).unwrap_or(NonZeroUsize::MIN);
        Self::new(capacity)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Prepends a snapshot, evicting the oldest when full.
    ///
    /// Fails without touching the buffer if at least two entries exist and
    /// `snapshot` is older than the newest one.
    pub fn ingest(&mut self, snapshot: Snapshot) -> Result<(), HistoryError> {
        if self.len > 1 {
            if let Some(newest) = self.newest() {
                if snapshot.timestamp < newest.timestamp {
                    return Err(HistoryError::OutOfOrder {
                        newest: newest.timestamp,
                        received: snapshot.timestamp,
                    });
                }
            }
        }

        let cap = self.entries.len();
        self.head = (self.head + cap - 1) % cap;
        self.entries[self.head] = Some(snapshot);
        self.len = (self.len + 1).min(cap);
        Ok(())
    }

    /// Forgets every entry. Storage is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The snapshot at `index`, counting from the newest.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        if index >= self.len {
            return None;
        }
        let idx = (self.head + index) % self.entries.len();
        self.entries[idx].as_ref()
    }

    #[must_use]
    pub fn newest(&self) -> Option<&Snapshot> {
        self.get(0)
    }

    #[must_use]
    pub fn oldest(&self) -> Option<&Snapshot> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterates from newest to oldest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }
}
