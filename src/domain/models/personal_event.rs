use crate::domain::services::time_model::{Slot, FIRST_SLOT_MINUTES, FULL_DAY_MINUTES};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_EVENT_COLOR: &str = "#9c27b0";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PersonalEvent {
    pub id: String,
    pub date: NaiveDate,
    /// Ignored for full-day events.
    pub slot: Option<Slot>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub color: String,
    pub duration_min: u32,
    pub created_at: DateTime<Utc>,
}

impl PersonalEvent {
    pub fn new(
        date: NaiveDate,
        slot: Option<Slot>,
        title: String,
        description: Option<String>,
        color: Option<String>,
        duration_min: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date,
            slot,
            title,
            description: description.unwrap_or_default(),
            color: color.unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string()),
            duration_min,
            created_at: Utc::now(),
        }
    }

    pub fn is_full_day(&self) -> bool {
        self.duration_min >= FULL_DAY_MINUTES
    }

    /// Start and end of the event in minutes since midnight.
    pub fn span_minutes(&self) -> (u32, u32) {
        let start = self.slot.map(Slot::minutes).unwrap_or(FIRST_SLOT_MINUTES);
        (start, start + self.duration_min)
    }
}
