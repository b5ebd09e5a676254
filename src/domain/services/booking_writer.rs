use crate::domain::models::blocked_time::BlockedTimeEntry;
use crate::domain::models::booking::{
    Booking, BookingSource, BookingStatus, Customer, NewBookingParams, PaymentInfo, PaymentType, RefundStatus,
    ServiceItem,
};
use crate::domain::models::personal_event::PersonalEvent;
use crate::domain::ports::{
    ChargeRequest, CollectionRepository, GatewayPayment, GatewayRefund, PaymentGateway, SavedCard,
};
use crate::domain::services::availability::{latest_start_for, occupancy_conflict, DaySnapshot};
use crate::domain::services::notifications::{
    cancellation_fields, confirmation_fields, refund_fields, NotificationDispatcher,
};
use crate::domain::services::time_model::{required_slot_count, slot_window, Slot};
use crate::error::AppError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Payments older than this are never offered for refund.
const TRANSACTION_MAX_AGE_DAYS: i64 = 90;
const APPOINTMENT_NOTE_KEYWORDS: [&str; 10] = [
    "deposit", "booking", "appointment", "beauty", "facial", "brow", "lash", "wax", "teeth", "whitening",
];

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ManualPaymentStatus {
    PaidFull,
    PaidDeposit,
    Unpaid,
    Comp,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefundType {
    Full,
    Partial,
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionPeriod {
    #[default]
    #[serde(rename = "1week")]
    OneWeek,
    #[serde(rename = "2weeks")]
    TwoWeeks,
    #[serde(rename = "1month")]
    OneMonth,
}

impl TransactionPeriod {
    pub fn days(self) -> i64 {
        match self {
            TransactionPeriod::OneWeek => 7,
            TransactionPeriod::TwoWeeks => 14,
            TransactionPeriod::OneMonth => 30,
        }
    }
}

/// How an appointment is paid for.
#[derive(Debug, Clone)]
pub enum BookingPayment {
    /// Card token from the web checkout; the deposit is charged now.
    Online { source_id: String, save_card: bool },
    /// Entered by the admin with an already-known payment state.
    Manual { payment_status: ManualPaymentStatus },
    /// Paid in full at the counter.
    InPerson { method: String },
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub date: NaiveDate,
    pub slot: String,
    pub duration_min: u32,
    pub customer: Customer,
    pub services: Vec<ServiceItem>,
    pub payment: BookingPayment,
}

#[derive(Debug, Serialize)]
pub struct FreedSlots {
    pub booking_id: String,
    pub slots_freed: usize,
}

#[derive(Debug, Serialize)]
pub struct RefundOutcome {
    pub booking: Booking,
    pub refund_type: RefundType,
    pub refund_amount_cents: i64,
    pub refund_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TodayOverview {
    pub date: NaiveDate,
    pub appointments: Vec<Booking>,
    pub today_revenue_cents: i64,
    pub week_revenue_cents: i64,
    pub next_appointment: Option<Booking>,
}

/// Ledger changes a refund decision implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundPlan {
    pub amount_cents: i64,
    pub refund_status: RefundStatus,
    pub remaining_balance_cents: i64,
    pub status: BookingStatus,
}

/// Half the total, rounded up.
pub fn online_deposit_cents(total_cents: i64) -> i64 {
    total_cents / 2 + total_cents % 2
}

pub fn plan_refund(booking: &Booking, refund_type: RefundType) -> RefundPlan {
    match refund_type {
        RefundType::Full => RefundPlan {
            amount_cents: booking.deposit_paid_cents,
            refund_status: RefundStatus::Full,
            remaining_balance_cents: booking.total_amount_cents,
            status: BookingStatus::Cancelled,
        },
        RefundType::Partial => {
            let amount = (booking.deposit_paid_cents + 1) / 2;
            RefundPlan {
                amount_cents: amount,
                refund_status: RefundStatus::Partial,
                remaining_balance_cents: booking.total_amount_cents - (booking.deposit_paid_cents - amount),
                status: booking.status,
            }
        }
        RefundType::None => RefundPlan {
            amount_cents: 0,
            refund_status: RefundStatus::None,
            remaining_balance_cents: booking.remaining_balance_cents,
            status: booking.status,
        },
    }
}

/// Deterministic key so a retried request never moves money twice.
pub fn idempotency_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Sum of the service prices. Negative prices are rejected.
pub fn total_price_cents(services: &[ServiceItem]) -> Result<i64, AppError> {
    if services.iter().any(|s| s.price_cents < 0) {
        return Err(AppError::Validation("Service prices cannot be negative".into()));
    }
    services
        .iter()
        .try_fold(0i64, |total, s| total.checked_add(s.price_cents))
        .ok_or_else(|| AppError::Validation("Service prices are too large".into()))
}

/// Payment record and amount already collected for an admin-entered booking.
fn manual_settlement(status: ManualPaymentStatus, total_cents: i64) -> (PaymentInfo, i64) {
    let (payment_type, paid) = match status {
        ManualPaymentStatus::PaidFull => (PaymentType::Full, total_cents),
        ManualPaymentStatus::PaidDeposit => (PaymentType::Deposit, online_deposit_cents(total_cents)),
        ManualPaymentStatus::Unpaid => (PaymentType::Manual, 0),
        ManualPaymentStatus::Comp => (PaymentType::Comp, total_cents),
    };
    let method = match status {
        ManualPaymentStatus::Comp => "complimentary",
        _ => "manual",
    };
    (PaymentInfo { method: method.to_string(), payment_id: None, payment_type }, paid)
}

fn ensure_refundable(booking: &Booking) -> Result<(), AppError> {
    if booking.refund_status != RefundStatus::None {
        return Err(AppError::AlreadyRefunded(booking.id.clone()));
    }
    if booking.status == BookingStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Booking {} is still waiting for its deposit",
            booking.id
        )));
    }
    Ok(())
}

fn is_appointment_payment(payment: &GatewayPayment) -> bool {
    let note = payment.note.as_deref().unwrap_or("").to_lowercase();
    APPOINTMENT_NOTE_KEYWORDS.iter().any(|k| note.contains(k))
}

pub struct BookingWriter {
    bookings: Arc<dyn CollectionRepository<Booking>>,
    blocked: Arc<dyn CollectionRepository<BlockedTimeEntry>>,
    events: Arc<dyn CollectionRepository<PersonalEvent>>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: NotificationDispatcher,
    write_lock: Arc<Mutex<()>>,
}

impl BookingWriter {
    pub fn new(
        bookings: Arc<dyn CollectionRepository<Booking>>,
        blocked: Arc<dyn CollectionRepository<BlockedTimeEntry>>,
        events: Arc<dyn CollectionRepository<PersonalEvent>>,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: NotificationDispatcher,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self { bookings, blocked, events, gateway, dispatcher, write_lock }
    }

    pub async fn create_booking(&self, request: NewBooking) -> Result<Booking, AppError> {
        let slot: Slot = request.slot.parse()?;
        let slots_needed = required_slot_count(request.duration_min);
        let window = slot_window(slot, slots_needed)?;
        if slot.minutes() > latest_start_for(request.duration_min) {
            return Err(AppError::OutOfBusinessHours { slot: slot.label(), slots_needed });
        }

        if request.services.is_empty() {
            return Err(AppError::Validation("At least one service is required".into()));
        }
        if request.customer.name.trim().is_empty() {
            return Err(AppError::Validation("Customer name is required".into()));
        }
        let total_cents = total_price_cents(&request.services)?;

        let (payment, deposit_cents, source) = match &request.payment {
            BookingPayment::Online { source_id, save_card } => {
                let (source_id, save_card) = (source_id.clone(), *save_card);
                return self
                    .create_online_booking(request, slot, window, total_cents, &source_id, save_card)
                    .await;
            }
            BookingPayment::Manual { payment_status } => {
                let (payment, paid) = manual_settlement(*payment_status, total_cents);
                (payment, paid, BookingSource::Manual)
            }
            BookingPayment::InPerson { method } => {
                let payment = PaymentInfo {
                    method: method.clone(),
                    payment_id: None,
                    payment_type: PaymentType::Full,
                };
                (payment, total_cents, BookingSource::InPerson)
            }
        };

        let primary = Booking::new(NewBookingParams {
            customer: request.customer,
            services: request.services,
            date: request.date,
            slot,
            total_duration_min: request.duration_min,
            total_amount_cents: total_cents,
            deposit_paid_cents: deposit_cents,
            payment,
            source,
        });
        let marker_count = self.claim_window(&primary, &window).await?;
        self.announce(&primary, marker_count).await;
        Ok(primary)
    }

    /// Holds the window with a pending record, charges the deposit with the
    /// lock released, then confirms or gives the window back.
    async fn create_online_booking(
        &self,
        request: NewBooking,
        slot: Slot,
        window: Vec<Slot>,
        total_cents: i64,
        source_id: &str,
        save_card: bool,
    ) -> Result<Booking, AppError> {
        let deposit = online_deposit_cents(total_cents);
        if deposit <= 0 {
            return Err(AppError::Validation("Online bookings need a positive deposit".into()));
        }

        let customer_id = self
            .gateway
            .find_or_create_customer(
                &request.customer.email,
                &request.customer.name,
                &request.customer.phone,
            )
            .await
            .map_err(|e| {
                error!("create_booking: customer lookup failed: {}", e);
                e
            })?;

        let note = format!(
            "Deposit for {} on {} at {}",
            request.services.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", "),
            request.date,
            slot
        );
        let key = idempotency_key(&[
            "deposit",
            source_id,
            &request.customer.email,
            &request.date.to_string(),
            &slot.label(),
            &deposit.to_string(),
        ]);

        let mut primary = Booking::new(NewBookingParams {
            customer: request.customer,
            services: request.services,
            date: request.date,
            slot,
            total_duration_min: request.duration_min,
            total_amount_cents: total_cents,
            deposit_paid_cents: 0,
            payment: PaymentInfo {
                method: "card".to_string(),
                payment_id: None,
                payment_type: PaymentType::Deposit,
            },
            source: BookingSource::Online,
        });
        primary.status = BookingStatus::Pending;

        let marker_count = self.claim_window(&primary, &window).await?;

        let charged = self
            .gateway
            .charge(ChargeRequest {
                source_id,
                amount_cents: deposit,
                idempotency_key: &key,
                buyer_email: &primary.customer.email,
                note: &note,
            })
            .await;
        let charged = match charged {
            Ok(payment) => payment,
            Err(e) => {
                error!(booking_id = %primary.id, "create_booking: deposit charge failed: {}", e);
                self.release_claim(&primary.id).await;
                return Err(e);
            }
        };
        info!(payment_id = %charged.id, amount_cents = deposit, "Deposit charged");

        primary.payment.payment_id = Some(charged.id);
        primary.deposit_paid_cents = deposit;
        primary.remaining_balance_cents = total_cents - deposit;
        primary.status = BookingStatus::Confirmed;

        if let Err(e) = self.confirm_claim(&primary).await {
            error!("create_booking: failed to persist booking {}: {}", primary.id, e);
            self.compensate_charge(&primary).await;
            self.release_claim(&primary.id).await;
            return Err(e);
        }

        if save_card {
            match self.gateway.save_card(source_id, &customer_id).await {
                Ok(card_id) => info!(card_id = %card_id, "Card saved on file"),
                Err(e) => warn!("create_booking: could not save card: {}", e),
            }
        }

        self.announce(&primary, marker_count).await;
        Ok(primary)
    }

    /// Writes `primary` and its markers if every slot of `window` is still
    /// free. Returns the number of markers written.
    async fn claim_window(&self, primary: &Booking, window: &[Slot]) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut bookings = self.bookings.read_all().await?;
        let blocked = self.blocked.read_all().await?;
        let events = self.events.read_all().await?;

        {
            let snapshot = DaySnapshot::new(primary.date, &bookings, &blocked, &events);
            for candidate in window {
                if let Some(occupancy) = occupancy_conflict(&snapshot, *candidate) {
                    warn!(
                        "create_booking: {} on {} rejected, {}",
                        candidate,
                        primary.date,
                        occupancy.describe()
                    );
                    return Err(AppError::SlotConflict {
                        slot: candidate.label(),
                        reason: occupancy.describe(),
                    });
                }
            }
        }

        let markers: Vec<Booking> = window
            .iter()
            .skip(1)
            .enumerate()
            .map(|(i, s)| primary.occupancy_marker(*s, i + 1))
            .collect();
        let marker_count = markers.len();

        bookings.push(primary.clone());
        bookings.extend(markers);
        self.bookings.write_all(&bookings).await?;
        Ok(marker_count)
    }

    /// Replaces the pending primary with its paid version.
    async fn confirm_claim(&self, primary: &Booking) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        let mut bookings = self.bookings.read_all().await?;
        let stored = bookings
            .iter_mut()
            .find(|b| b.id == primary.id && b.is_main_booking)
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "Booking {} was removed while its payment was processing",
                    primary.id
                ))
            })?;
        *stored = primary.clone();
        self.bookings.write_all(&bookings).await
    }

    /// Drops a pending claim. Failures are logged; the caller already has an
    /// error to return.
    async fn release_claim(&self, booking_id: &str) {
        let _guard = self.write_lock.lock().await;

        let result = async {
            let mut bookings = self.bookings.read_all().await?;
            bookings.retain(|b| !b.belongs_to(booking_id));
            self.bookings.write_all(&bookings).await
        }
        .await;

        if let Err(e) = result {
            error!(booking_id, "Pending booking could not be released: {}", e);
        }
    }

    async fn announce(&self, primary: &Booking, marker_count: usize) {
        info!(
            booking_id = %primary.id,
            date = %primary.date,
            slot = %primary.slot,
            markers = marker_count,
            source = ?primary.source,
            "Booking created"
        );
        self.dispatcher.dispatch(confirmation_fields(primary)).await;
    }

    pub async fn delete_booking(&self, booking_id: &str) -> Result<FreedSlots, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut bookings = self.bookings.read_all().await?;
        let primary = bookings
            .iter()
            .find(|b| b.id == booking_id && b.is_main_booking)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", booking_id)))?;

        let before = bookings.len();
        bookings.retain(|b| !b.belongs_to(booking_id));
        let slots_freed = before - bookings.len();

        self.bookings.write_all(&bookings).await?;

        info!(booking_id, slots_freed, "Booking deleted");

        self.dispatcher.dispatch(cancellation_fields(&primary, slots_freed)).await;
        Ok(FreedSlots { booking_id: booking_id.to_string(), slots_freed })
    }

    pub async fn process_refund(
        &self,
        booking_id: &str,
        refund_type: RefundType,
        reason: Option<String>,
    ) -> Result<RefundOutcome, AppError> {
        let (plan, payment_id) = {
            let _guard = self.write_lock.lock().await;
            let bookings = self.bookings.read_all().await?;
            let booking = bookings
                .iter()
                .find(|b| b.id == booking_id && b.is_main_booking)
                .ok_or_else(|| AppError::NotFound(format!("Booking {}", booking_id)))?;
            ensure_refundable(booking)?;
            (plan_refund(booking, refund_type), booking.payment.payment_id.clone())
        };
        let reason = reason.unwrap_or_else(|| format!("{:?} refund", refund_type).to_lowercase());

        // One key per booking: a racing duplicate replays the same refund.
        let gateway_refund: Option<GatewayRefund> = match payment_id.as_deref() {
            Some(payment_id) if plan.amount_cents > 0 => {
                let key = idempotency_key(&["refund", booking_id, &plan.amount_cents.to_string()]);
                let refund = self
                    .gateway
                    .refund(payment_id, plan.amount_cents, &key, &reason)
                    .await
                    .map_err(|e| {
                        error!(booking_id, "Refund failed at the gateway: {}", e);
                        e
                    })?;
                Some(refund)
            }
            _ => None,
        };

        let _guard = self.write_lock.lock().await;
        let mut bookings = self.bookings.read_all().await?;
        let booking = bookings
            .iter_mut()
            .find(|b| b.id == booking_id && b.is_main_booking)
            .ok_or_else(|| {
                error!(booking_id, "Booking disappeared while its refund was processed");
                AppError::NotFound(format!("Booking {}", booking_id))
            })?;
        ensure_refundable(booking)?;

        booking.refund_status = plan.refund_status;
        booking.refund_amount_cents = plan.amount_cents;
        booking.remaining_balance_cents = plan.remaining_balance_cents;
        booking.status = plan.status;
        booking.refund_reason = Some(reason);
        booking.refund_id = gateway_refund.as_ref().map(|r| r.id.clone());
        booking.refund_processed_at = Some(Utc::now());
        let updated = booking.clone();

        self.bookings.write_all(&bookings).await?;

        info!(
            booking_id,
            refund_type = ?refund_type,
            amount_cents = plan.amount_cents,
            "Refund recorded"
        );

        if refund_type != RefundType::None {
            self.dispatcher.dispatch(refund_fields(&updated)).await;
        }

        Ok(RefundOutcome {
            booking: updated,
            refund_type,
            refund_amount_cents: plan.amount_cents,
            refund_id: gateway_refund.map(|r| r.id),
        })
    }

    /// Primary records only, ordered by date and slot.
    pub async fn list_bookings(&self, date: Option<NaiveDate>) -> Result<Vec<Booking>, AppError> {
        let mut primaries: Vec<Booking> = self
            .bookings
            .read_all()
            .await?
            .into_iter()
            .filter(|b| b.is_main_booking)
            .filter(|b| date.is_none_or(|d| b.date == d))
            .collect();
        primaries.sort_by_key(|b| (b.date, b.slot));
        Ok(primaries)
    }

    pub async fn today_overview(&self, now: NaiveDateTime) -> Result<TodayOverview, AppError> {
        let today = now.date();
        let week_start = today - Duration::days(6);
        let primaries = self.list_bookings(None).await?;

        let appointments: Vec<Booking> = primaries.iter().filter(|b| b.date == today).cloned().collect();
        let today_revenue_cents = appointments.iter().map(Booking::collected_cents).sum();
        let week_revenue_cents = primaries
            .iter()
            .filter(|b| b.date >= week_start && b.date <= today)
            .map(Booking::collected_cents)
            .sum();

        let next_appointment = primaries
            .iter()
            .filter(|b| b.status != BookingStatus::Cancelled)
            .find(|b| b.date.and_time(b.slot.time()) > now)
            .cloned();

        Ok(TodayOverview {
            date: today,
            appointments,
            today_revenue_cents,
            week_revenue_cents,
            next_appointment,
        })
    }

    /// Recent refundable appointment payments, newest first.
    pub async fn list_transactions(
        &self,
        period: TransactionPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<GatewayPayment>, AppError> {
        let since = now - Duration::days(period.days());
        let oldest = now - Duration::days(TRANSACTION_MAX_AGE_DAYS);

        let mut payments: Vec<GatewayPayment> = self
            .gateway
            .list_recent_payments(since)
            .await?
            .into_iter()
            .filter(|p| p.status != "FAILED" && p.status != "CANCELED")
            .filter(|p| p.created_at.is_none_or(|t| t >= oldest))
            .filter(is_appointment_payment)
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    /// Enabled cards on file for the payment customer with `email`.
    pub async fn saved_cards(&self, email: &str) -> Result<Vec<SavedCard>, AppError> {
        let Some(customer_id) = self.gateway.find_customer(email).await? else {
            return Ok(Vec::new());
        };
        let cards = self.gateway.list_cards(&customer_id).await?;
        Ok(cards.into_iter().filter(|c| c.enabled).collect())
    }

    pub async fn refund_transaction(
        &self,
        payment_id: &str,
        amount_cents: i64,
        kind: &str,
    ) -> Result<GatewayRefund, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::Validation("Refund amount must be positive".into()));
        }
        // Two equal partial refunds of one payment are separate operations.
        let key = Uuid::new_v4().to_string();
        let reason = format!("{} refund via admin panel", kind);
        let refund = self.gateway.refund(payment_id, amount_cents, &key, &reason).await?;
        info!(payment_id, refund_id = %refund.id, amount_cents, "Transaction refunded");
        Ok(refund)
    }
}
