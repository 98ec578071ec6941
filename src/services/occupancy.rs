//! Per-slot occupancy state machine
//!
//! Consumes one `(slot, state)` observation at a time and emits entry/exit
//! events. This is the single owner of slot state and open sessions.
//!
//! Key behaviors:
//! - none/Vacant -> Occupied opens a session and emits `Entry`
//! - Occupied -> Vacant closes the session and emits `Exit`
//! - none -> Vacant only records the state
//! - repeated labels are no-ops (debounced)
//! - slots missing from a frame are never touched, so a missed detection
//!   cannot fabricate an exit

use crate::domain::session::{
    minutes_between, EntryEvent, ExitEvent, OccupancyEvent, OpenSession,
};
use crate::domain::types::{SlotIdentity, SlotKey, SlotNumber, SlotState, Timestamp};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error(
        "clock went backwards for slot {slot_number} ({slot_key}): now {now} is before entry {entry_time}"
    )]
    ClockNonmonotonic {
        slot_key: SlotKey,
        slot_number: SlotNumber,
        entry_time: Timestamp,
        now: Timestamp,
    },
}

/// Occupancy state machine for all known slots
#[derive(Default)]
pub struct OccupancyTracker {
    states: FxHashMap<SlotKey, SlotState>,
    open: FxHashMap<SlotKey, OpenSession>,
}

impl OccupancyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one observation for a slot.
    ///
    /// Returns the transition event, if any. A clock that moved backwards
    /// relative to the slot's open session is rejected and the slot is left
    /// as it was.
    pub fn observe(
        &mut self,
        identity: &SlotIdentity,
        observed: SlotState,
        now: Timestamp,
    ) -> Result<Option<OccupancyEvent>, TrackerError> {
        let key = identity.key;

        if let Some(session) = self.open.get(&key) {
            if now < session.entry_time {
                return Err(TrackerError::ClockNonmonotonic {
                    slot_key: key,
                    slot_number: session.slot_number,
                    entry_time: session.entry_time,
                    now,
                });
            }
        }

        let previous = self.states.insert(key, observed);

        let event = match (previous, observed) {
            (Some(SlotState::Occupied), SlotState::Occupied)
            | (Some(SlotState::Vacant), SlotState::Vacant) => None,
            (None, SlotState::Vacant) => {
                debug!(slot_key = %key, slot = %identity.number, "slot_initially_vacant");
                None
            }
            (None | Some(SlotState::Vacant), SlotState::Occupied) => {
                let session = OpenSession::new(key, identity.number, now);
                info!(
                    slot = %identity.number,
                    slot_key = %key,
                    sid = %session.session_id,
                    entry_time = %now,
                    "session_opened"
                );
                let event = EntryEvent {
                    session_id: session.session_id.clone(),
                    slot_key: key,
                    slot_number: identity.number,
                    entry_time: now,
                };
                self.open.insert(key, session);
                Some(OccupancyEvent::Entry(event))
            }
            (Some(SlotState::Occupied), SlotState::Vacant) => {
                self.open.remove(&key).map(|session| {
                    let duration_minutes = minutes_between(session.entry_time, now);
                    info!(
                        slot = %session.slot_number,
                        slot_key = %key,
                        sid = %session.session_id,
                        duration_min = %format!("{duration_minutes:.1}"),
                        "session_closed"
                    );
                    OccupancyEvent::Exit(ExitEvent {
                        session_id: session.session_id,
                        slot_key: key,
                        slot_number: session.slot_number,
                        entry_time: session.entry_time,
                        exit_time: now,
                        duration_minutes,
                    })
                })
            }
        };

        Ok(event)
    }

    /// Current state of a slot, `None` if it has never been observed
    pub fn state(&self, key: &SlotKey) -> Option<SlotState> {
        self.states.get(key).copied()
    }

    pub fn open_session(&self, key: &SlotKey) -> Option<&OpenSession> {
        self.open.get(key)
    }

    /// Open sessions ordered by slot number
    pub fn open_sessions(&self) -> Vec<&OpenSession> {
        let mut sessions: Vec<&OpenSession> = self.open.values().collect();
        sessions.sort_by_key(|s| s.slot_number);
        sessions
    }

    pub fn occupied_count(&self) -> usize {
        self.open.len()
    }

    pub fn tracked_slots(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn identity(x: i64, number: u32) -> SlotIdentity {
        SlotIdentity { key: SlotKey::new(x, 20), number: SlotNumber(number), first_seen_at: t(0) }
    }

    #[test]
    fn test_first_vacant_emits_nothing() {
        let mut tracker = OccupancyTracker::new();
        let slot = identity(10, 1);

        assert_eq!(tracker.observe(&slot, SlotState::Vacant, t(0)).unwrap(), None);
        assert_eq!(tracker.state(&slot.key), Some(SlotState::Vacant));
        assert!(tracker.open_session(&slot.key).is_none());
    }

    #[test]
    fn test_first_occupied_opens_session() {
        let mut tracker = OccupancyTracker::new();
        let slot = identity(10, 1);

        let event = tracker.observe(&slot, SlotState::Occupied, t(5)).unwrap();
        let Some(OccupancyEvent::Entry(entry)) = event else {
            panic!("expected entry event, got {event:?}");
        };
        assert_eq!(entry.slot_number, SlotNumber(1));
        assert_eq!(entry.entry_time, t(5));
        assert_eq!(tracker.occupied_count(), 1);
    }

    #[test]
    fn test_full_cycle_emits_exit_with_duration() {
        let mut tracker = OccupancyTracker::new();
        let slot = identity(10, 1);

        tracker.observe(&slot, SlotState::Vacant, t(0)).unwrap();
        tracker.observe(&slot, SlotState::Occupied, t(1)).unwrap();
        let event = tracker.observe(&slot, SlotState::Vacant, t(301)).unwrap();

        let Some(OccupancyEvent::Exit(exit)) = event else {
            panic!("expected exit event, got {event:?}");
        };
        assert_eq!(exit.entry_time, t(1));
        assert_eq!(exit.exit_time, t(301));
        assert_eq!(exit.duration_minutes, 5.0);
        assert_eq!(tracker.occupied_count(), 0);
        assert_eq!(tracker.state(&slot.key), Some(SlotState::Vacant));
    }

    #[test]
    fn test_repeated_labels_are_debounced() {
        let mut tracker = OccupancyTracker::new();
        let slot = identity(10, 1);

        assert!(tracker.observe(&slot, SlotState::Occupied, t(0)).unwrap().is_some());
        let entry_sid = tracker.open_session(&slot.key).unwrap().session_id.clone();
        for s in 1..10 {
            assert_eq!(tracker.observe(&slot, SlotState::Occupied, t(s)).unwrap(), None);
        }
        // Entry time is not refreshed by repeated observations
        assert_eq!(tracker.open_session(&slot.key).unwrap().entry_time, t(0));
        assert_eq!(tracker.open_session(&slot.key).unwrap().session_id, entry_sid);

        tracker.observe(&slot, SlotState::Vacant, t(10)).unwrap();
        assert_eq!(tracker.observe(&slot, SlotState::Vacant, t(11)).unwrap(), None);
    }

    #[test]
    fn test_slots_are_independent() {
        let mut tracker = OccupancyTracker::new();
        let a = identity(10, 1);
        let b = identity(100, 2);

        tracker.observe(&a, SlotState::Occupied, t(0)).unwrap();
        tracker.observe(&b, SlotState::Occupied, t(30)).unwrap();
        assert_eq!(tracker.open_sessions().len(), 2);
        assert_eq!(tracker.open_sessions()[0].slot_number, SlotNumber(1));

        let event = tracker.observe(&b, SlotState::Vacant, t(90)).unwrap();
        assert!(matches!(event, Some(OccupancyEvent::Exit(ref e)) if e.slot_number == SlotNumber(2)));
        assert!(tracker.open_session(&a.key).is_some());
        assert_eq!(tracker.tracked_slots(), 2);
    }

    #[test]
    fn test_clock_regression_is_rejected() {
        let mut tracker = OccupancyTracker::new();
        let slot = identity(10, 1);

        tracker.observe(&slot, SlotState::Occupied, t(100)).unwrap();
        let err = tracker.observe(&slot, SlotState::Vacant, t(50)).unwrap_err();
        assert!(matches!(err, TrackerError::ClockNonmonotonic { .. }));

        // State untouched, session still open
        assert_eq!(tracker.state(&slot.key), Some(SlotState::Occupied));
        assert_eq!(tracker.open_session(&slot.key).unwrap().entry_time, t(100));
    }

    #[test]
    fn test_zero_length_session() {
        let mut tracker = OccupancyTracker::new();
        let slot = identity(10, 1);

        tracker.observe(&slot, SlotState::Occupied, t(7)).unwrap();
        let event = tracker.observe(&slot, SlotState::Vacant, t(7)).unwrap();
        assert!(matches!(event, Some(OccupancyEvent::Exit(ref e)) if e.duration_minutes == 0.0));
    }
}
