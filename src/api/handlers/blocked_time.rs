use axum::{extract::{Query, State}, response::IntoResponse, Json};
use crate::api::dtos::requests::{DateQuery, RestOfDayRequest, ToggleSlotRequest};
use crate::api::extractors::admin::AdminUser;
use crate::error::AppError;
use crate::state::AppState;
use serde_json::json;
use std::sync::Arc;

pub async fn list_blocked_times(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let blocked = state.blocking.list_blocked(query.date).await?;
    Ok(Json(blocked))
}

pub async fn toggle_slot(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<ToggleSlotRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.blocking.toggle_slot(payload.date, &payload.slot, payload.block).await?;
    Ok(Json(outcome))
}

pub async fn block_rest_of_day(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<RestOfDayRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = state.config.local_now();
    let date = payload.date.unwrap_or(now.date());
    let blocked = state.blocking.block_rest_of_day(date, now).await?;
    Ok(Json(json!({ "date": date, "blocked_slots": blocked })))
}
