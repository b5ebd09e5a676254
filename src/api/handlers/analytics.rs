use axum::{extract::State, response::IntoResponse, Json};
use crate::api::dtos::responses::DashboardResponse;
use crate::api::extractors::admin::AdminUser;
use crate::domain::services::analytics::{
    category_breakdown, dashboard, BookingCompletedEvent, BookingStartedEvent, VisitorEvent,
};
use crate::error::AppError;
use crate::state::AppState;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

pub async fn track_visitor(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VisitorEvent>,
) -> Result<impl IntoResponse, AppError> {
    let today = state.config.local_now().date();
    state.analytics.track_visitor(payload, today, Utc::now().timestamp_millis()).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn track_booking_started(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BookingStartedEvent>,
) -> Result<impl IntoResponse, AppError> {
    let today = state.config.local_now().date();
    state.analytics.track_booking_started(payload, today).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn track_booking_completed(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BookingCompletedEvent>,
) -> Result<impl IntoResponse, AppError> {
    let today = state.config.local_now().date();
    state.analytics.track_booking_completed(payload, today).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let today = state.config.local_now().date();
    let bookings = state.booking_repo.read_all().await?;
    let tracked = state.analytics.snapshot().await?;

    Ok(Json(DashboardResponse {
        dashboard: dashboard(&bookings, &tracked, today),
        categories: category_breakdown(&bookings, today),
    }))
}
