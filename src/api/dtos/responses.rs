use crate::domain::services::analytics::{CategoryCount, Dashboard};
use crate::domain::services::availability::{DateAvailability, SlotStatus};
use crate::domain::services::time_model::Slot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub duration: u32,
    pub available_slots: Vec<Slot>,
}

#[derive(Serialize)]
pub struct BulkAvailabilityResponse {
    pub availability: BTreeMap<NaiveDate, DateAvailability>,
}

#[derive(Serialize)]
pub struct DaySlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<SlotStatus>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub dashboard: Dashboard,
    pub categories: Vec<CategoryCount>,
}
