use crate::domain::models::booking::{Customer, ServiceItem};
use crate::domain::services::booking_writer::{ManualPaymentStatus, RefundType, TransactionPeriod};
use crate::domain::services::time_model::{parse_duration_text, SLOT_LENGTH_MINUTES};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub duration: Option<u32>,
}

#[derive(Deserialize)]
pub struct BulkAvailabilityRequest {
    pub dates: Vec<NaiveDate>,
    pub duration: Option<u32>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct RequiredDateQuery {
    pub date: NaiveDate,
}

#[derive(Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub notes: String,
}

impl From<CustomerRequest> for Customer {
    fn from(c: CustomerRequest) -> Self {
        Customer {
            name: c.name.trim().to_string(),
            phone: c.phone.trim().to_string(),
            email: c.email.trim().to_lowercase(),
            notes: c.notes,
        }
    }
}

#[derive(Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    pub price_cents: i64,
    pub duration_min: Option<u32>,
    /// Free text such as "90 min" or "2 hours".
    pub duration: Option<String>,
}

impl From<ServiceRequest> for ServiceItem {
    fn from(s: ServiceRequest) -> Self {
        let duration_min = s
            .duration_min
            .or_else(|| s.duration.as_deref().map(parse_duration_text))
            .unwrap_or(SLOT_LENGTH_MINUTES);
        ServiceItem { name: s.name, price_cents: s.price_cents, duration_min }
    }
}

/// Explicit duration, else the sum of the services, else one hour.
pub fn booking_duration(explicit: Option<u32>, services: &[ServiceItem]) -> u32 {
    explicit
        .filter(|d| *d > 0)
        .unwrap_or_else(|| {
            services
                .iter()
                .fold(0u32, |total, s| total.saturating_add(s.duration_min))
        })
        .max(1)
}

#[derive(Deserialize)]
pub struct CreateOnlineBookingRequest {
    pub date: NaiveDate,
    pub slot: String,
    pub customer: CustomerRequest,
    pub services: Vec<ServiceRequest>,
    pub duration_min: Option<u32>,
    /// Card token produced by the checkout form.
    pub source_id: String,
    #[serde(default)]
    pub save_card: bool,
}

#[derive(Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum AdminBookingPayment {
    Manual { payment_status: ManualPaymentStatus },
    InPerson { payment_method: String },
}

#[derive(Deserialize)]
pub struct CreateAdminBookingRequest {
    pub date: NaiveDate,
    pub slot: String,
    pub customer: CustomerRequest,
    pub services: Vec<ServiceRequest>,
    pub duration_min: Option<u32>,
    #[serde(flatten)]
    pub payment: AdminBookingPayment,
}

#[derive(Deserialize)]
pub struct CustomerCardsRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub refund_type: RefundType,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CreatePersonalEventRequest {
    pub date: NaiveDate,
    pub slot: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub full_day: bool,
}

#[derive(Deserialize)]
pub struct ToggleSlotRequest {
    pub date: NaiveDate,
    pub slot: String,
    pub block: bool,
}

#[derive(Deserialize)]
pub struct RestOfDayRequest {
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub period: TransactionPeriod,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionRefundKind {
    Full,
    Partial,
}

impl TransactionRefundKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionRefundKind::Full => "full",
            TransactionRefundKind::Partial => "partial",
        }
    }
}

#[derive(Deserialize)]
pub struct TransactionRefundRequest {
    pub amount_cents: i64,
    pub kind: TransactionRefundKind,
}
