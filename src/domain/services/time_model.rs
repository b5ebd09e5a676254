//! Slot labels, minute-of-day arithmetic and the booking tier rules.
//!
//! The business day is a fixed sequence of thirteen hourly slots from
//! 9:00 AM to 9:00 PM. Every other component converts labels through this
//! module; nothing else parses "h:mm AM" strings.

use crate::error::AppError;
use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const FIRST_SLOT_MINUTES: u32 = 540;
pub const LAST_SLOT_MINUTES: u32 = 1260;
pub const SLOT_LENGTH_MINUTES: u32 = 60;
pub const SLOT_COUNT: usize = 13;

/// Durations at or above this many minutes block a whole day.
pub const FULL_DAY_MINUTES: u32 = 720;

pub const ALL_SLOTS: [Slot; SLOT_COUNT] = [
    Slot(540), Slot(600), Slot(660), Slot(720), Slot(780), Slot(840), Slot(900),
    Slot(960), Slot(1020), Slot(1080), Slot(1140), Slot(1200), Slot(1260),
];

/// One hourly start position of the business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot(u32);

impl Slot {
    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Position in `ALL_SLOTS`.
    pub fn index(self) -> usize {
        ((self.0 - FIRST_SLOT_MINUTES) / SLOT_LENGTH_MINUTES) as usize
    }

    pub fn time(self) -> NaiveTime {
        NaiveTime::MIN + TimeDelta::minutes(i64::from(self.0))
    }

    pub fn label(self) -> String {
        let hours = self.0 / 60;
        let minutes = self.0 % 60;
        let period = if hours >= 12 { "PM" } else { "AM" };
        let hours12 = match hours % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hours12, minutes, period)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Slot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minutes = slot_to_minutes(s)?;
        minutes_to_slot(minutes).ok_or_else(|| AppError::InvalidSlot(s.to_string()))
    }
}

impl TryFrom<String> for Slot {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.label()
    }
}

/// Parses a 12-hour label ("9:00 AM", "12:30 PM") into minutes since midnight.
pub fn slot_to_minutes(label: &str) -> Result<u32, AppError> {
    let invalid = || AppError::InvalidSlot(label.to_string());

    let (time, period) = label.trim().split_once(' ').ok_or_else(invalid)?;
    let (hours, minutes) = match time.split_once(':') {
        Some((h, m)) => (h, m),
        None => (time, "0"),
    };
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hours) || minutes >= 60 {
        return Err(invalid());
    }

    let hours24 = match period.trim().to_ascii_uppercase().as_str() {
        "AM" if hours == 12 => 0,
        "AM" => hours,
        "PM" if hours == 12 => 12,
        "PM" => hours + 12,
        _ => return Err(invalid()),
    };

    Ok(hours24 * 60 + minutes)
}

pub fn minutes_to_slot(minutes: u32) -> Option<Slot> {
    if !(FIRST_SLOT_MINUTES..=LAST_SLOT_MINUTES).contains(&minutes) {
        return None;
    }
    if (minutes - FIRST_SLOT_MINUTES) % SLOT_LENGTH_MINUTES != 0 {
        return None;
    }
    Some(Slot(minutes))
}

pub fn all_slots() -> impl Iterator<Item = Slot> {
    ALL_SLOTS.into_iter()
}

/// Rounds a requested duration up to its booking tier: 60, 120, 180, then
/// whole hours.
pub fn normalize_duration(duration_min: u32) -> u32 {
    match duration_min {
        0..=60 => 60,
        61..=120 => 120,
        121..=180 => 180,
        d => d.div_ceil(SLOT_LENGTH_MINUTES).saturating_mul(SLOT_LENGTH_MINUTES),
    }
}

pub fn required_slot_count(duration_min: u32) -> usize {
    (normalize_duration(duration_min) / SLOT_LENGTH_MINUTES) as usize
}

/// The `count` consecutive slots starting at `start`. Never wraps and never
/// truncates.
pub fn slot_window(start: Slot, count: usize) -> Result<Vec<Slot>, AppError> {
    let begin = start.index();
    begin
        .checked_add(count)
        .filter(|_| count > 0)
        .and_then(|end| ALL_SLOTS.get(begin..end))
        .map(<[Slot]>::to_vec)
        .ok_or(AppError::OutOfBusinessHours {
            slot: start.label(),
            slots_needed: count,
        })
}

/// Parses service durations given as text ("30 min", "2 hours", "1 hr").
/// Unrecognised input counts as one hour.
pub fn parse_duration_text(text: &str) -> u32 {
    let lower = text.trim().to_ascii_lowercase();
    let digits_end = lower.find(|c: char| !c.is_ascii_digit()).unwrap_or(lower.len());
    let Ok(value) = lower[..digits_end].parse::<u32>() else {
        return 60;
    };
    let unit = lower[digits_end..].trim_start();
    if unit.starts_with("min") {
        value
    } else if unit.starts_with("hour") || unit.starts_with("hr") {
        value.saturating_mul(60)
    } else {
        60
    }
}
