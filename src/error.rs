use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),
    #[error("A {slots_needed}-slot appointment at {slot} does not fit within business hours")]
    OutOfBusinessHours { slot: String, slots_needed: usize },
    #[error("Time slot {slot} is not available ({reason})")]
    SlotConflict { slot: String, reason: String },
    #[error("Booking {0} has already been refunded")]
    AlreadyRefunded(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Store(format!("serialization failed: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidSlot(_)
            | AppError::OutOfBusinessHours { .. }
            | AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::SlotConflict { .. } | AppError::AlreadyRefunded(_) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Gateway(msg) => {
                error!("Payment gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Store(msg) | AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
