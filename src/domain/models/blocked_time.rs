use crate::domain::services::time_model::Slot;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    Manual,
    PersonalEvent,
    AutoBlockSunday,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlockedTimeEntry {
    pub date: NaiveDate,
    pub slot: Slot,
    pub blocked_at: DateTime<Utc>,
    pub reason: Option<BlockReason>,
    pub event_id: Option<String>,
    pub event_title: Option<String>,
}

impl BlockedTimeEntry {
    pub fn new(date: NaiveDate, slot: Slot, reason: BlockReason) -> Self {
        Self {
            date,
            slot,
            blocked_at: Utc::now(),
            reason: Some(reason),
            event_id: None,
            event_title: None,
        }
    }

    pub fn matches(&self, date: NaiveDate, slot: Slot) -> bool {
        self.date == date && self.slot == slot
    }
}

/// Appends `entry` unless its (date, slot) pair is already present.
/// Returns whether anything was inserted.
pub fn insert_unique(entries: &mut Vec<BlockedTimeEntry>, entry: BlockedTimeEntry) -> bool {
    if entries.iter().any(|e| e.matches(entry.date, entry.slot)) {
        return false;
    }
    entries.push(entry);
    true
}
