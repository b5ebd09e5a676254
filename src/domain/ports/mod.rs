use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const BOOKINGS: &str = "bookings";
pub const BLOCKED_TIMES: &str = "blocked-times";
pub const PERSONAL_EVENTS: &str = "personal-events";
pub const ADMIN_SETTINGS: &str = "admin-settings";
pub const ANALYTICS: &str = "analytics";

/// Whole-collection persistence: every write replaces the full collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, AppError>;
    async fn write_all(&self, collection: &str, documents: &[Value]) -> Result<(), AppError>;
}

#[async_trait]
pub trait CollectionRepository<T>: Send + Sync {
    async fn read_all(&self) -> Result<Vec<T>, AppError>;
    async fn write_all(&self, items: &[T]) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub receipt_url: Option<String>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

/// A card kept on file for a payment customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCard {
    pub id: String,
    pub last4: Option<String>,
    pub card_brand: Option<String>,
    pub exp_month: Option<u32>,
    pub exp_year: Option<u32>,
    pub enabled: bool,
}

pub struct ChargeRequest<'a> {
    pub source_id: &'a str,
    pub amount_cents: i64,
    pub idempotency_key: &'a str,
    pub buyer_email: &'a str,
    pub note: &'a str,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest<'_>) -> Result<GatewayPayment, AppError>;
    async fn refund(
        &self,
        payment_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<GatewayRefund, AppError>;
    async fn find_customer(&self, email: &str) -> Result<Option<String>, AppError>;
    async fn find_or_create_customer(
        &self,
        email: &str,
        name: &str,
        phone: &str,
    ) -> Result<String, AppError>;
    async fn save_card(&self, source_token: &str, customer_id: &str) -> Result<String, AppError>;
    async fn list_cards(&self, customer_id: &str) -> Result<Vec<SavedCard>, AppError>;
    async fn list_recent_payments(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatewayPayment>, AppError>;
}

/// Flat field map handed to the notification template.
pub type TemplateFields = BTreeMap<String, String>;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, fields: &TemplateFields) -> Result<(), AppError>;
}
