use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct VisitorSession {
    pub session_id: String,
    pub is_returning: bool,
    /// Milliseconds since the Unix epoch, as reported by the client.
    pub timestamp: i64,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Started,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversion {
    pub session_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub services: Vec<String>,
    pub date: NaiveDate,
    pub status: ConversionStatus,
    pub booking_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub time_to_book_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DailyStats {
    pub visitors: u64,
    pub new_visitors: u64,
    pub returning_visitors: u64,
    pub bookings_started: u64,
    pub bookings_completed: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct VisitorCounters {
    pub total: u64,
    pub new: u64,
    pub returning: u64,
    pub sessions: Vec<VisitorSession>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FunnelCounters {
    pub started: u64,
    pub completed: u64,
    pub conversions: Vec<Conversion>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AnalyticsState {
    pub visitors: VisitorCounters,
    pub bookings: FunnelCounters,
    pub daily_stats: BTreeMap<NaiveDate, DailyStats>,
    pub last_reset: Option<NaiveDate>,
}

impl AnalyticsState {
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DailyStats {
        self.daily_stats.entry(date).or_default()
    }
}
