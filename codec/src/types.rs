//! Core types for the codec.

/// A stable networked entity identifier.
///
/// Entity IDs are assigned by the networking layer and must remain stable
/// for the lifetime of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw entity ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Index of one synced part within a networked entity.
///
/// An entity with several synced children uses one index per child; a
/// plain entity uses index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SyncIndex(u32);

impl SyncIndex {
    /// The root part.
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for SyncIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Owner clock reading in milliseconds.
///
/// Carried as `u32` on the wire; differences are taken in `i64` so that
/// subtraction never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u32);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    /// Builds a timestamp from a signed millisecond count, clamping into range.
    #[must_use]
    pub fn saturating_from_i64(ms: i64) -> Self {
        Self(ms.clamp(0, i64::from(u32::MAX)) as u32)
    }

    #[must_use]
    pub const fn millis(self) -> u32 {
        self.0
    }

    /// Milliseconds as `i64` for arithmetic.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl From<u32> for Timestamp {
    fn from(ms: u32) -> Self {
        Self(ms)
    }
}

impl From<Timestamp> for u32 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrip() {
        let id: EntityId = 42u32.into();
        assert_eq!(id.raw(), 42);
        let raw: u32 = id.into();
        assert_eq!(raw, 42);
    }

    #[test]
    fn entity_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(EntityId::new(1));
        set.insert(EntityId::new(2));
        set.insert(EntityId::new(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn sync_index_root_is_zero() {
        assert_eq!(SyncIndex::ROOT, SyncIndex::default());
        assert_eq!(SyncIndex::from(3).raw(), 3);
    }

    #[test]
    fn timestamp_ordering_and_arithmetic() {
        let a = Timestamp::from_millis(900);
        let b = Timestamp::from_millis(1100);
        assert!(a < b);
        assert_eq!(a.as_i64() - b.as_i64(), -200);
    }

    #[test]
    fn timestamp_saturates() {
        assert_eq!(Timestamp::saturating_from_i64(-5).millis(), 0);
        assert_eq!(
            Timestamp::saturating_from_i64(i64::MAX).millis(),
            u32::MAX
        );
        assert_eq!(Timestamp::saturating_from_i64(1234).millis(), 1234);
    }
}
