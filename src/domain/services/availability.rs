use crate::domain::models::blocked_time::{BlockReason, BlockedTimeEntry};
use crate::domain::models::booking::Booking;
use crate::domain::models::personal_event::PersonalEvent;
use crate::domain::services::time_model::{all_slots, Slot, SLOT_LENGTH_MINUTES};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

/// Same-day bookings must start more than this many minutes from now.
pub const ADVANCE_BOOKING_MINUTES: u32 = 60;
/// Latest start for services of three hours or more (6:00 PM).
pub const LONG_SERVICE_CUTOFF: u32 = 1080;
/// Latest start for shorter services (7:00 PM).
pub const SHORT_SERVICE_CUTOFF: u32 = 1140;

/// The records of the three stores that concern one date.
pub struct DaySnapshot<'a> {
    pub date: NaiveDate,
    pub bookings: Vec<&'a Booking>,
    pub blocked: Vec<&'a BlockedTimeEntry>,
    pub events: Vec<&'a PersonalEvent>,
}

impl<'a> DaySnapshot<'a> {
    pub fn new(
        date: NaiveDate,
        bookings: &'a [Booking],
        blocked: &'a [BlockedTimeEntry],
        events: &'a [PersonalEvent],
    ) -> Self {
        Self {
            date,
            bookings: bookings.iter().filter(|b| b.date == date).collect(),
            blocked: blocked.iter().filter(|b| b.date == date).collect(),
            events: events.iter().filter(|e| e.date == date).collect(),
        }
    }

    pub fn has_full_day_event(&self) -> bool {
        self.events.iter().any(|e| e.is_full_day())
    }
}

/// Why a slot cannot take a new appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupancy {
    Blocked(Option<BlockReason>),
    Booked { customer: String },
    PersonalEvent { title: String },
}

impl Occupancy {
    pub fn describe(&self) -> String {
        match self {
            Occupancy::Blocked(Some(BlockReason::PersonalEvent)) => "blocked by a personal event".to_string(),
            Occupancy::Blocked(Some(BlockReason::AutoBlockSunday)) => "blocked (Sunday)".to_string(),
            Occupancy::Blocked(_) => "blocked".to_string(),
            Occupancy::Booked { customer } => format!("already booked by {}", customer),
            Occupancy::PersonalEvent { title } => format!("personal event: {}", title),
        }
    }
}

fn event_overlaps(event: &PersonalEvent, slot: Slot) -> bool {
    if event.is_full_day() {
        return true;
    }
    let (event_start, event_end) = event.span_minutes();
    let slot_start = slot.minutes();
    slot_start < event_end && slot_start + SLOT_LENGTH_MINUTES > event_start
}

/// Blocked entries, booking records (primaries and markers alike) and
/// personal events, checked in that order.
pub fn occupancy_conflict(snapshot: &DaySnapshot<'_>, slot: Slot) -> Option<Occupancy> {
    if let Some(entry) = snapshot.blocked.iter().find(|b| b.slot == slot) {
        return Some(Occupancy::Blocked(entry.reason));
    }

    if let Some(booking) = snapshot.bookings.iter().find(|b| b.slot == slot) {
        return Some(Occupancy::Booked { customer: booking.customer.name.clone() });
    }

    snapshot
        .events
        .iter()
        .find(|e| event_overlaps(e, slot))
        .map(|e| Occupancy::PersonalEvent { title: e.title.clone() })
}

/// Latest start minute allowed for a service of `duration_min`.
pub fn latest_start_for(duration_min: u32) -> u32 {
    if duration_min.div_ceil(SLOT_LENGTH_MINUTES) >= 3 {
        LONG_SERVICE_CUTOFF
    } else {
        SHORT_SERVICE_CUTOFF
    }
}

/// Bookable start slots for `duration_min` on the snapshot's date, in
/// chronological order.
pub fn available_start_slots(snapshot: &DaySnapshot<'_>, duration_min: u32, now: NaiveDateTime) -> Vec<Slot> {
    let is_today = now.date() == snapshot.date;
    let now_minutes = now.hour() * 60 + now.minute();
    let cutoff = latest_start_for(duration_min);

    all_slots()
        .filter(|slot| occupancy_conflict(snapshot, *slot).is_none())
        .filter(|slot| !is_today || slot.minutes() > now_minutes + ADVANCE_BOOKING_MINUTES)
        .filter(|slot| slot.minutes() <= cutoff)
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Booked,
    Blocked,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub slot: Slot,
    pub status: SlotState,
}

pub fn slot_statuses(snapshot: &DaySnapshot<'_>) -> Vec<SlotStatus> {
    all_slots()
        .map(|slot| {
            let status = match occupancy_conflict(snapshot, slot) {
                None => SlotState::Available,
                Some(Occupancy::Booked { .. }) => SlotState::Booked,
                Some(_) => SlotState::Blocked,
            };
            SlotStatus { slot, status }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DateAvailability {
    pub has_availability: bool,
    pub available_count: usize,
    pub is_entire_day_blocked: bool,
}

pub fn date_availability(snapshot: &DaySnapshot<'_>, duration_min: u32, now: NaiveDateTime) -> DateAvailability {
    if snapshot.has_full_day_event() {
        return DateAvailability {
            has_availability: false,
            available_count: 0,
            is_entire_day_blocked: true,
        };
    }

    let available_count = available_start_slots(snapshot, duration_min, now).len();
    DateAvailability {
        has_availability: available_count > 0,
        available_count,
        is_entire_day_blocked: false,
    }
}
