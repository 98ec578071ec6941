//! Append-only store of billed parking sessions
//!
//! Shared between the frame pipeline (writer) and reporting/export
//! (readers) behind a `parking_lot::RwLock`. Insertion is idempotent on
//! `(slot_key, exit_time)` so a re-delivered exit never bills twice.

use crate::domain::session::SessionRecord;
use crate::domain::types::{SlotKey, Timestamp};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tracing::debug;

#[derive(Default)]
struct Inner {
    records: Vec<SessionRecord>,
    keys: FxHashSet<(SlotKey, Timestamp)>,
}

/// Completed sessions in insertion order
#[derive(Default)]
pub struct SessionRecordStore {
    inner: RwLock<Inner>,
}

impl SessionRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Returns false (and stores nothing) on a duplicate key.
    pub fn insert(&self, record: SessionRecord) -> bool {
        let mut inner = self.inner.write();
        if !inner.keys.insert(record.key()) {
            debug!(
                slot = %record.slot_number,
                slot_key = %record.slot_key,
                exit_time = %record.exit_time,
                "duplicate_exit_ignored"
            );
            return false;
        }
        inner.records.push(record);
        true
    }

    /// Copy of all records in insertion order
    pub fn list_all(&self) -> Vec<SessionRecord> {
        self.inner.read().records.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    pub fn total_fees(&self) -> u64 {
        self.inner.read().records.iter().map(|r| r.fee).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::new_uuid_v7;
    use crate::domain::types::SlotNumber;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn record(x: i64, number: u32, exit_secs: i64, fee: u64) -> SessionRecord {
        let entry = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        SessionRecord {
            session_id: new_uuid_v7(),
            slot_key: SlotKey::new(x, 20),
            slot_number: SlotNumber(number),
            entry_time: entry,
            exit_time: entry + Duration::seconds(exit_secs),
            duration_minutes: exit_secs as f64 / 60.0,
            fee,
        }
    }

    #[test]
    fn test_insert_preserves_order() {
        let store = SessionRecordStore::new();
        assert!(store.is_empty());
        assert!(store.insert(record(100, 2, 60, 2000)));
        assert!(store.insert(record(10, 1, 120, 2000)));
        assert!(store.insert(record(100, 2, 900, 6000)));

        let numbers: Vec<u32> = store.list_all().iter().map(|r| r.slot_number.0).collect();
        assert_eq!(numbers, vec![2, 1, 2]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.total_fees(), 10000);
    }

    #[test]
    fn test_duplicate_exit_is_ignored() {
        let store = SessionRecordStore::new();
        let first = record(10, 1, 300, 2000);
        let mut replay = first.clone();
        replay.session_id = new_uuid_v7();

        assert!(store.insert(first.clone()));
        assert!(!store.insert(replay));
        assert!(!store.insert(first));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_readers() {
        let store = Arc::new(SessionRecordStore::new());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.insert(record(10, 1, i + 1, 2000));
                }
            })
        };
        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let len = store.list_all().len();
                    assert!(len >= last);
                    last = len;
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(store.len(), 200);
    }
}
