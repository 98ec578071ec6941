//! Slot identity resolution across jittery detections
//!
//! Boxes for the same physical slot drift by a few pixels from frame to
//! frame. The resolver snaps the top-left corner to a grid and hands out
//! sequential slot numbers the first time a key is seen. Numbers are never
//! reused and the mapping is never pruned, so a slot that is occluded for a
//! while comes back with the same number.

use crate::domain::types::{Detection, SlotIdentity, SlotKey, SlotNumber, Timestamp};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Default quantization cell (pixels)
pub const DEFAULT_GRID_PX: u32 = 10;

/// Maps raw detection locations to persistent slot identities
pub struct SlotIdentityResolver {
    grid_px: u32,
    identities: FxHashMap<SlotKey, SlotIdentity>,
    next_number: u32,
}

impl SlotIdentityResolver {
    pub fn new(grid_px: u32) -> Self {
        Self { grid_px: grid_px.max(1), identities: FxHashMap::default(), next_number: 1 }
    }

    /// Resolve a detection to its slot identity, registering the key if new
    pub fn resolve(&mut self, detection: &Detection, now: Timestamp) -> SlotIdentity {
        let key = SlotKey::from_bbox(&detection.bbox, self.grid_px);
        self.resolve_key(key, now)
    }

    /// Resolve an already quantized key
    pub fn resolve_key(&mut self, key: SlotKey, now: Timestamp) -> SlotIdentity {
        if let Some(identity) = self.identities.get(&key) {
            return *identity;
        }

        let identity = SlotIdentity { key, number: SlotNumber(self.next_number), first_seen_at: now };
        self.next_number += 1;
        self.identities.insert(key, identity);

        debug!(slot_key = %key, slot = %identity.number, "slot_registered");
        identity
    }

    pub fn get(&self, key: &SlotKey) -> Option<&SlotIdentity> {
        self.identities.get(key)
    }

    /// All known identities ordered by slot number
    pub fn identities(&self) -> Vec<SlotIdentity> {
        let mut all: Vec<SlotIdentity> = self.identities.values().copied().collect();
        all.sort_by_key(|identity| identity.number);
        all
    }

    pub fn grid_px(&self) -> u32 {
        self.grid_px
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl Default for SlotIdentityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_PX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_numbers_assigned_in_first_seen_order() {
        let mut resolver = SlotIdentityResolver::default();
        let a = resolver.resolve(&Detection::vacant(10.0, 20.0, 60.0, 90.0), t0());
        let b = resolver.resolve(&Detection::occupied(100.0, 20.0, 150.0, 90.0), t0());
        let c = resolver.resolve(&Detection::vacant(200.0, 20.0, 250.0, 90.0), t0());

        assert_eq!(a.number, SlotNumber(1));
        assert_eq!(b.number, SlotNumber(2));
        assert_eq!(c.number, SlotNumber(3));
        assert_eq!(resolver.len(), 3);
    }

    #[test]
    fn test_jitter_within_cell_keeps_identity() {
        let mut resolver = SlotIdentityResolver::default();
        let first = resolver.resolve(&Detection::vacant(101.0, 49.0, 150.0, 90.0), t0());
        let second =
            resolver.resolve(&Detection::occupied(98.0, 52.0, 149.0, 91.0), t0() + Duration::seconds(1));

        assert_eq!(first.key, SlotKey::new(100, 50));
        assert_eq!(first, second);
        assert_eq!(second.first_seen_at, t0());
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_reappearing_slot_keeps_number() {
        let mut resolver = SlotIdentityResolver::default();
        let key = SlotKey::new(10, 20);
        let first = resolver.resolve_key(key, t0());

        // Other slots come and go while the first one is occluded
        for i in 1..5 {
            resolver.resolve_key(SlotKey::new(i * 100, 20), t0() + Duration::seconds(i));
        }

        let again = resolver.resolve_key(key, t0() + Duration::seconds(60));
        assert_eq!(again.number, first.number);
        assert_eq!(resolver.resolve_key(SlotKey::new(900, 900), t0()).number, SlotNumber(6));
    }

    #[test]
    fn test_identities_sorted_by_number() {
        let mut resolver = SlotIdentityResolver::new(5);
        resolver.resolve_key(SlotKey::new(500, 0), t0());
        resolver.resolve_key(SlotKey::new(0, 0), t0());
        resolver.resolve_key(SlotKey::new(250, 0), t0());

        let numbers: Vec<u32> = resolver.identities().iter().map(|i| i.number.0).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(resolver.identities()[0].key, SlotKey::new(500, 0));
    }

    #[test]
    fn test_zero_grid_is_clamped() {
        let resolver = SlotIdentityResolver::new(0);
        assert_eq!(resolver.grid_px(), 1);
        assert!(resolver.is_empty());
    }
}
