use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{slot::hhmm, AppointmentStatus, SlotGrid, SlotKey, SlotStatus};
use crate::store::Snapshot;

/// Occupancy of a snapshot keyed by slot: approved appointments and
/// operator blocks.
#[derive(Debug, Default)]
pub struct SlotIndex {
    booked: BTreeSet<SlotKey>,
    blocked: BTreeSet<SlotKey>,
}

impl SlotIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        Self::build_excluding(snapshot, None)
    }

    /// Like [`SlotIndex::build`] but ignores one appointment, so a move can
    /// be checked without the appointment occupying its own slot.
    pub fn build_excluding(snapshot: &Snapshot, exclude_id: Option<&str>) -> Self {
        let booked = snapshot
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Approved)
            .filter(|a| Some(a.id.as_str()) != exclude_id)
            .map(|a| a.slot)
            .collect();
        let blocked = snapshot.blocked.iter().map(|b| b.slot).collect();
        Self { booked, blocked }
    }

    /// Whether an approved appointment holds `slot`, whatever the time.
    pub fn is_booked(&self, slot: &SlotKey) -> bool {
        self.booked.contains(slot)
    }

    /// Past wins over Booked, Booked over Blocked.
    pub fn status(&self, slot: &SlotKey, now: NaiveDateTime) -> SlotStatus {
        if slot.instant() < now {
            SlotStatus::Past
        } else if self.is_booked(slot) {
            SlotStatus::Booked
        } else if self.blocked.contains(slot) {
            SlotStatus::Blocked
        } else {
            SlotStatus::Available
        }
    }
}

pub fn slot_status(snapshot: &Snapshot, slot: &SlotKey, now: NaiveDateTime) -> SlotStatus {
    SlotIndex::build(snapshot).status(slot, now)
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    #[serde(with = "hhmm")]
    pub time: chrono::NaiveTime,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayBoard {
    pub date: NaiveDate,
    pub slots: Vec<SlotView>,
}

/// Every grid slot of every candidate day, starting with today.
pub fn board(snapshot: &Snapshot, grid: &SlotGrid, now: NaiveDateTime) -> Vec<DayBoard> {
    let index = SlotIndex::build(snapshot);
    grid.days(now.date())
        .into_iter()
        .map(|date| DayBoard {
            date,
            slots: grid
                .times()
                .iter()
                .map(|&time| SlotView {
                    time,
                    status: index.status(&SlotKey::new(date, time), now),
                })
                .collect(),
        })
        .collect()
}
