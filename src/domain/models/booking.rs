use crate::domain::services::time_model::Slot;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Pending,
    Blocked,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Deposit,
    Full,
    Manual,
    Comp,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    None,
    Partial,
    Full,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BookingSource {
    Online,
    Manual,
    InPerson,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub notes: String,
}

impl Customer {
    /// Identity used for customer counting: email, falling back to phone.
    pub fn key(&self) -> &str {
        if self.email.is_empty() { &self.phone } else { &self.email }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceItem {
    pub name: String,
    pub price_cents: i64,
    pub duration_min: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentInfo {
    pub method: String,
    pub payment_id: Option<String>,
    pub payment_type: PaymentType,
}

/// One stored appointment record. A primary record carries the customer
/// and money; each extra slot of a multi-hour appointment is an occupancy
/// marker pointing back at its primary through `parent_booking_id`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    pub id: String,
    pub customer: Customer,
    pub services: Vec<ServiceItem>,
    pub date: NaiveDate,
    pub slot: Slot,
    pub total_duration_min: u32,
    pub total_amount_cents: i64,
    pub deposit_paid_cents: i64,
    pub remaining_balance_cents: i64,
    pub status: BookingStatus,
    pub payment: PaymentInfo,
    #[serde(default)]
    pub refund_status: RefundStatus,
    #[serde(default)]
    pub refund_amount_cents: i64,
    pub refund_reason: Option<String>,
    pub refund_id: Option<String>,
    pub refund_processed_at: Option<DateTime<Utc>>,
    pub source: BookingSource,
    pub is_main_booking: bool,
    #[serde(default)]
    pub is_blocked_slot: bool,
    pub parent_booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewBookingParams {
    pub customer: Customer,
    pub services: Vec<ServiceItem>,
    pub date: NaiveDate,
    pub slot: Slot,
    pub total_duration_min: u32,
    pub total_amount_cents: i64,
    pub deposit_paid_cents: i64,
    pub payment: PaymentInfo,
    pub source: BookingSource,
}

impl Booking {
    pub fn new(params: NewBookingParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remaining_balance_cents: params.total_amount_cents - params.deposit_paid_cents,
            customer: params.customer,
            services: params.services,
            date: params.date,
            slot: params.slot,
            total_duration_min: params.total_duration_min,
            total_amount_cents: params.total_amount_cents,
            deposit_paid_cents: params.deposit_paid_cents,
            status: BookingStatus::Confirmed,
            payment: params.payment,
            refund_status: RefundStatus::None,
            refund_amount_cents: 0,
            refund_reason: None,
            refund_id: None,
            refund_processed_at: None,
            source: params.source,
            is_main_booking: true,
            is_blocked_slot: false,
            parent_booking_id: None,
            created_at: Utc::now(),
        }
    }

    /// Zero-value record holding `slot` for this primary booking.
    pub fn occupancy_marker(&self, slot: Slot, ordinal: usize) -> Self {
        let service_name = self.service_names();
        Self {
            id: format!("{}-blocked-{}", self.id, ordinal),
            customer: Customer {
                name: format!("[BLOCKED] {}", self.customer.name),
                ..self.customer.clone()
            },
            services: vec![ServiceItem {
                name: format!("[BLOCKED FOR] {}", service_name),
                price_cents: 0,
                duration_min: 0,
            }],
            date: self.date,
            slot,
            total_duration_min: 0,
            total_amount_cents: 0,
            deposit_paid_cents: 0,
            remaining_balance_cents: 0,
            status: BookingStatus::Blocked,
            payment: PaymentInfo {
                method: "blocked".to_string(),
                payment_id: None,
                payment_type: self.payment.payment_type,
            },
            refund_status: RefundStatus::None,
            refund_amount_cents: 0,
            refund_reason: None,
            refund_id: None,
            refund_processed_at: None,
            source: self.source,
            is_main_booking: false,
            is_blocked_slot: true,
            parent_booking_id: Some(self.id.clone()),
            created_at: self.created_at,
        }
    }

    pub fn service_names(&self) -> String {
        self.services.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
    }

    /// Money actually kept: the deposit less anything refunded.
    pub fn collected_cents(&self) -> i64 {
        self.deposit_paid_cents - self.refund_amount_cents
    }

    /// True for the primary itself and for each of its markers.
    pub fn belongs_to(&self, primary_id: &str) -> bool {
        self.id == primary_id || self.parent_booking_id.as_deref() == Some(primary_id)
    }
}
