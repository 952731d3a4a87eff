//! Bidirectional room-id mapping, materialized at merge time.

use std::collections::HashMap;

/// Two one-way lookup tables over the configured (longId, shortId) pairs.
///
/// Ids absent from the tables resolve to themselves; lookups never fail.
#[derive(Debug, Default, Clone)]
pub struct RoomIdMap {
    short_of: HashMap<u64, u64>,
    long_of: HashMap<u64, u64>,
}

impl RoomIdMap {
    /// Replace both tables from the configured pair list.
    pub fn rebuild(&mut self, pairs: &[(u64, u64)]) {
        self.short_of.clear();
        self.long_of.clear();
        for &(long, short) in pairs {
            self.short_of.insert(long, short);
            self.long_of.insert(short, long);
        }
    }

    /// Short id for a room, or the id itself if unmapped.
    pub fn short_id(&self, room_id: u64) -> u64 {
        self.short_of.get(&room_id).copied().unwrap_or(room_id)
    }

    /// Long id for a room, or the id itself if unmapped.
    pub fn long_id(&self, room_id: u64) -> u64 {
        self.long_of.get(&room_id).copied().unwrap_or(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_lookup() {
        let mut map = RoomIdMap::default();
        map.rebuild(&[(460688, 23058), (545068, 21144080)]);

        assert_eq!(map.short_id(460688), 23058);
        assert_eq!(map.long_id(23058), 460688);
        assert_eq!(map.short_id(545068), 21144080);
        assert_eq!(map.long_id(21144080), 545068);
    }

    #[test]
    fn test_identity_fallback() {
        let mut map = RoomIdMap::default();
        map.rebuild(&[(460688, 23058)]);

        assert_eq!(map.short_id(999), 999);
        assert_eq!(map.long_id(999), 999);
    }

    #[test]
    fn test_rebuild_replaces_previous_pairs() {
        let mut map = RoomIdMap::default();
        map.rebuild(&[(1, 2)]);
        map.rebuild(&[(3, 4)]);

        assert_eq!(map.short_id(1), 1);
        assert_eq!(map.short_id(3), 4);
    }
}
