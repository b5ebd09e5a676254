use axum::{
    body::Body,
    extract::Request,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{
    analytics, availability, blocked_time, booking, health, personal_event, settings, transactions,
};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Public booking flow
        .route("/api/v1/availability", get(availability::get_availability))
        .route("/api/v1/availability/bulk", post(availability::bulk_availability))
        .route("/api/v1/bookings", post(booking::create_online_booking))
        .route("/api/v1/customer-cards", post(booking::customer_cards))

        // Analytics tracking
        .route("/api/v1/analytics/visitor", post(analytics::track_visitor))
        .route("/api/v1/analytics/booking-started", post(analytics::track_booking_started))
        .route("/api/v1/analytics/booking-completed", post(analytics::track_booking_completed))

        // Admin bookings
        .route("/api/v1/admin/bookings", get(booking::list_bookings).post(booking::create_admin_booking))
        .route("/api/v1/admin/bookings/{booking_id}", delete(booking::delete_booking))
        .route("/api/v1/admin/bookings/{booking_id}/refund", post(booking::refund_booking))
        .route("/api/v1/admin/today", get(booking::today_overview))
        .route("/api/v1/admin/slots", get(availability::day_slots))

        // Admin calendar
        .route(
            "/api/v1/admin/personal-events",
            get(personal_event::list_personal_events).post(personal_event::create_personal_event),
        )
        .route("/api/v1/admin/personal-events/{event_id}", delete(personal_event::delete_personal_event))
        .route("/api/v1/admin/blocked-times", get(blocked_time::list_blocked_times))
        .route("/api/v1/admin/blocked-times/toggle", post(blocked_time::toggle_slot))
        .route("/api/v1/admin/blocked-times/rest-of-day", post(blocked_time::block_rest_of_day))

        // Admin settings, analytics and payments
        .route("/api/v1/admin/settings", get(settings::get_settings).put(settings::save_settings))
        .route("/api/v1/admin/analytics/dashboard", get(analytics::get_dashboard))
        .route("/api/v1/admin/transactions", get(transactions::list_transactions))
        .route("/api/v1/admin/transactions/{payment_id}/refund", post(transactions::refund_transaction))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        admin = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .with_state(state)
}
