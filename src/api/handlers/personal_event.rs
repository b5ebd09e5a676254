use axum::{extract::{Path, Query, State}, http::StatusCode, response::IntoResponse, Json};
use crate::api::dtos::requests::{CreatePersonalEventRequest, DateQuery};
use crate::api::extractors::admin::AdminUser;
use crate::domain::services::blocking::NewPersonalEvent;
use crate::domain::services::time_model::{FULL_DAY_MINUTES, SLOT_LENGTH_MINUTES};
use crate::error::AppError;
use crate::state::AppState;
use serde_json::json;
use std::sync::Arc;

pub async fn create_personal_event(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreatePersonalEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let duration_min = if payload.full_day {
        FULL_DAY_MINUTES
    } else {
        payload.duration_min.unwrap_or(SLOT_LENGTH_MINUTES)
    };

    let event = state.blocking.add_personal_event(NewPersonalEvent {
        date: payload.date,
        slot: payload.slot,
        title: payload.title,
        description: payload.description,
        color: payload.color,
        duration_min,
    }).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn list_personal_events(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let events = state.blocking.list_personal_events(query.date).await?;
    Ok(Json(events))
}

pub async fn delete_personal_event(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let released = state.blocking.delete_personal_event(&event_id).await?;
    Ok(Json(json!({ "status": "deleted", "released_slots": released })))
}
