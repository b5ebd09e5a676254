use axum::{extract::{Path, Query, State}, http::StatusCode, response::IntoResponse, Json};
use crate::api::dtos::requests::{
    booking_duration, AdminBookingPayment, CreateAdminBookingRequest, CreateOnlineBookingRequest,
    CustomerCardsRequest, DateQuery, RefundRequest,
};
use crate::api::extractors::admin::AdminUser;
use crate::domain::models::booking::ServiceItem;
use crate::domain::services::booking_writer::{BookingPayment, NewBooking};
use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;
use serde_json::json;
use tracing::{info, warn};

pub async fn create_online_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOnlineBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("create_online_booking: {} at {}", payload.date, payload.slot);

    if payload.source_id.trim().is_empty() {
        return Err(AppError::Validation("A payment source is required".into()));
    }

    let services: Vec<ServiceItem> = payload.services.into_iter().map(Into::into).collect();
    let booking = state.booking_writer.create_booking(NewBooking {
        date: payload.date,
        slot: payload.slot,
        duration_min: booking_duration(payload.duration_min, &services),
        customer: payload.customer.into(),
        services,
        payment: BookingPayment::Online {
            source_id: payload.source_id,
            save_card: payload.save_card,
        },
    }).await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn create_admin_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateAdminBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payment = match payload.payment {
        AdminBookingPayment::Manual { payment_status } => BookingPayment::Manual { payment_status },
        AdminBookingPayment::InPerson { payment_method } => {
            BookingPayment::InPerson { method: payment_method }
        }
    };

    let services: Vec<ServiceItem> = payload.services.into_iter().map(Into::into).collect();
    let booking = state.booking_writer.create_booking(NewBooking {
        date: payload.date,
        slot: payload.slot,
        duration_min: booking_duration(payload.duration_min, &services),
        customer: payload.customer.into(),
        services,
        payment,
    }).await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.booking_writer.list_bookings(query.date).await?;
    Ok(Json(bookings))
}

pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let freed = state.booking_writer.delete_booking(&booking_id).await?;
    Ok(Json(freed))
}

pub async fn refund_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(booking_id): Path<String>,
    Json(payload): Json<RefundRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.booking_writer
        .process_refund(&booking_id, payload.refund_type, payload.reason)
        .await?;
    Ok(Json(outcome))
}

pub async fn today_overview(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let overview = state.booking_writer.today_overview(state.config.local_now()).await?;
    Ok(Json(overview))
}

/// Cards the checkout form can offer again. Lookup failures read as "no cards".
pub async fn customer_cards(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CustomerCardsRequest>,
) -> impl IntoResponse {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Json(json!({ "cards": [] }));
    }

    match state.booking_writer.saved_cards(&email).await {
        Ok(cards) => Json(json!({ "cards": cards })),
        Err(e) => {
            warn!("customer_cards: lookup failed: {}", e);
            Json(json!({ "cards": [] }))
        }
    }
}
