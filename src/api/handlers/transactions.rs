use axum::{extract::{Path, Query, State}, response::IntoResponse, Json};
use crate::api::dtos::requests::{TransactionRefundRequest, TransactionsQuery};
use crate::api::extractors::admin::AdminUser;
use crate::error::AppError;
use crate::state::AppState;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state.booking_writer.list_transactions(query.period, Utc::now()).await?;
    Ok(Json(json!({
        "period": query.period,
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

pub async fn refund_transaction(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(payment_id): Path<String>,
    Json(payload): Json<TransactionRefundRequest>,
) -> Result<impl IntoResponse, AppError> {
    let refund = state.booking_writer
        .refund_transaction(&payment_id, payload.amount_cents, payload.kind.as_str())
        .await?;
    Ok(Json(refund))
}
