//! Parking session data model: open sessions, occupancy events and billed records

use crate::domain::types::{SlotKey, SlotNumber, Timestamp};
use serde::Serialize;
use uuid::Uuid;

/// Timestamp layout used in export rows
pub const EXPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Minutes elapsed between two instants, as a float
#[inline]
pub fn minutes_between(entry: Timestamp, exit: Timestamp) -> f64 {
    (exit - entry).num_milliseconds() as f64 / 60_000.0
}

/// A slot that is currently occupied
#[derive(Debug, Clone)]
pub struct OpenSession {
    pub session_id: String,
    pub slot_key: SlotKey,
    pub slot_number: SlotNumber,
    pub entry_time: Timestamp,
}

impl OpenSession {
    pub fn new(slot_key: SlotKey, slot_number: SlotNumber, entry_time: Timestamp) -> Self {
        Self { session_id: new_uuid_v7(), slot_key, slot_number, entry_time }
    }
}

/// Emitted when a slot becomes occupied
#[derive(Debug, Clone, PartialEq)]
pub struct EntryEvent {
    pub session_id: String,
    pub slot_key: SlotKey,
    pub slot_number: SlotNumber,
    pub entry_time: Timestamp,
}

/// Emitted when an occupied slot becomes vacant
#[derive(Debug, Clone, PartialEq)]
pub struct ExitEvent {
    pub session_id: String,
    pub slot_key: SlotKey,
    pub slot_number: SlotNumber,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    pub duration_minutes: f64,
}

/// Transition produced by the occupancy state machine
#[derive(Debug, Clone, PartialEq)]
pub enum OccupancyEvent {
    Entry(EntryEvent),
    Exit(ExitEvent),
}

/// Completed, billed parking session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub slot_key: SlotKey,
    pub slot_number: SlotNumber,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    pub duration_minutes: f64,
    pub fee: u64,
}

impl SessionRecord {
    pub fn from_exit(exit: ExitEvent, fee: u64) -> Self {
        Self {
            session_id: exit.session_id,
            slot_key: exit.slot_key,
            slot_number: exit.slot_number,
            entry_time: exit.entry_time,
            exit_time: exit.exit_time,
            duration_minutes: exit.duration_minutes,
            fee,
        }
    }

    /// Key that makes insertion idempotent
    #[inline]
    pub fn key(&self) -> (SlotKey, Timestamp) {
        (self.slot_key, self.exit_time)
    }

    /// One output row for the spreadsheet/report collaborator
    pub fn to_export_row(&self) -> ExportRow {
        ExportRow {
            slot: self.slot_number.0,
            entry: self.entry_time.format(EXPORT_TIME_FORMAT).to_string(),
            exit: self.exit_time.format(EXPORT_TIME_FORMAT).to_string(),
            duration_minutes: (self.duration_minutes * 10.0).round() / 10.0,
            fee: self.fee,
        }
    }
}

/// Flat export representation of a session record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub slot: u32,
    pub entry: String,
    pub exit: String,
    pub duration_minutes: f64,
    pub fee: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_minutes_between() {
        let entry = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(minutes_between(entry, entry + Duration::seconds(300)), 5.0);
        assert_eq!(minutes_between(entry, entry + Duration::seconds(90)), 1.5);
        assert_eq!(minutes_between(entry, entry), 0.0);
    }

    #[test]
    fn test_export_row_formatting() {
        let entry = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let exit = entry + Duration::seconds(437);
        let record = SessionRecord {
            session_id: new_uuid_v7(),
            slot_key: SlotKey::new(10, 20),
            slot_number: SlotNumber(3),
            entry_time: entry,
            exit_time: exit,
            duration_minutes: minutes_between(entry, exit),
            fee: 4000,
        };

        let row = record.to_export_row();
        assert_eq!(row.slot, 3);
        assert_eq!(row.entry, "2025-06-01 08:00:00");
        assert_eq!(row.exit, "2025-06-01 08:07:17");
        assert_eq!(row.duration_minutes, 7.3);
        assert_eq!(row.fee, 4000);
    }
}
