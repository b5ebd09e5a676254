use axum::{extract::{Query, State}, response::IntoResponse, Json};
use crate::api::dtos::requests::{AvailabilityQuery, BulkAvailabilityRequest, RequiredDateQuery};
use crate::api::dtos::responses::{AvailabilityResponse, BulkAvailabilityResponse, DaySlotsResponse};
use crate::api::extractors::admin::AdminUser;
use crate::domain::models::blocked_time::BlockedTimeEntry;
use crate::domain::models::booking::Booking;
use crate::domain::models::personal_event::PersonalEvent;
use crate::domain::services::availability::{available_start_slots, date_availability, slot_statuses, DaySnapshot};
use crate::domain::services::time_model::SLOT_LENGTH_MINUTES;
use crate::error::AppError;
use crate::state::AppState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const MAX_BULK_DATES: usize = 62;

pub(crate) async fn read_sources(
    state: &AppState,
) -> Result<(Vec<Booking>, Vec<BlockedTimeEntry>, Vec<PersonalEvent>), AppError> {
    tokio::try_join!(
        state.booking_repo.read_all(),
        state.blocked_repo.read_all(),
        state.event_repo.read_all(),
    )
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, AppError> {
    let duration = query.duration.filter(|d| *d > 0).unwrap_or(SLOT_LENGTH_MINUTES);
    let (bookings, blocked, events) = read_sources(&state).await?;

    let snapshot = DaySnapshot::new(query.date, &bookings, &blocked, &events);
    let available_slots = available_start_slots(&snapshot, duration, state.config.local_now());

    debug!(date = %query.date, duration, count = available_slots.len(), "Availability computed");
    Ok(Json(AvailabilityResponse { date: query.date, duration, available_slots }))
}

pub async fn bulk_availability(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkAvailabilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.dates.len() > MAX_BULK_DATES {
        return Err(AppError::Validation(format!("At most {} dates per request", MAX_BULK_DATES)));
    }
    let duration = payload.duration.filter(|d| *d > 0).unwrap_or(SLOT_LENGTH_MINUTES);
    let now = state.config.local_now();
    let (bookings, blocked, events) = read_sources(&state).await?;

    let availability: BTreeMap<_, _> = payload
        .dates
        .iter()
        .map(|date| {
            let snapshot = DaySnapshot::new(*date, &bookings, &blocked, &events);
            (*date, date_availability(&snapshot, duration, now))
        })
        .collect();

    Ok(Json(BulkAvailabilityResponse { availability }))
}

pub async fn day_slots(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<RequiredDateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (bookings, blocked, events) = read_sources(&state).await?;
    let snapshot = DaySnapshot::new(query.date, &bookings, &blocked, &events);
    Ok(Json(DaySlotsResponse { date: query.date, slots: slot_statuses(&snapshot) }))
}
