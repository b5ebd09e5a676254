use crate::domain::models::booking::Booking;
use crate::domain::ports::TemplateFields;
use crate::domain::services::settings::SettingsService;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Queues notifications for the background worker. Sending never waits on
/// the notifier and never fails the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<TemplateFields>,
    settings: Arc<SettingsService>,
}

impl NotificationDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<TemplateFields>, settings: Arc<SettingsService>) -> Self {
        Self { tx, settings }
    }

    pub async fn dispatch(&self, fields: TemplateFields) {
        match self.settings.get().await {
            Ok(settings) if !settings.email_notifications => {
                debug!("Notifications disabled, dropping message");
                return;
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read settings before notifying: {}", e),
        }

        if self.tx.send(fields).is_err() {
            warn!("Notification worker is gone, message dropped");
        }
    }
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

fn base_fields(subject: &str, booking: &Booking) -> TemplateFields {
    let mut fields = TemplateFields::new();
    fields.insert("_subject".into(), subject.into());
    fields.insert("customer_name".into(), booking.customer.name.clone());
    fields.insert("customer_phone".into(), booking.customer.phone.clone());
    fields.insert("customer_email".into(), booking.customer.email.clone());
    fields.insert("service".into(), booking.service_names());
    fields.insert("appointment_date".into(), booking.date.format("%m/%d/%Y").to_string());
    fields.insert("appointment_time".into(), booking.slot.label());
    fields.insert("total_amount".into(), format_cents(booking.total_amount_cents));
    fields
}

pub fn confirmation_fields(booking: &Booking) -> TemplateFields {
    let mut fields = base_fields("NEW BOOKING RECEIVED", booking);
    fields.insert("deposit_paid".into(), format_cents(booking.deposit_paid_cents));
    fields.insert("remaining_balance".into(), format_cents(booking.remaining_balance_cents));
    fields.insert("payment_method".into(), booking.payment.method.clone());
    if let Some(payment_id) = &booking.payment.payment_id {
        fields.insert("payment_id".into(), payment_id.clone());
    }
    let notes = if booking.customer.notes.is_empty() { "None" } else { booking.customer.notes.as_str() };
    fields.insert("notes".into(), notes.to_string());
    fields
}

pub fn cancellation_fields(booking: &Booking, slots_freed: usize) -> TemplateFields {
    let mut fields = base_fields("APPOINTMENT CANCELLED", booking);
    fields.insert("payment_method".into(), booking.payment.method.clone());
    fields.insert("slots_freed".into(), slots_freed.to_string());
    fields.insert("cancelled_by".into(), "Admin Panel".into());
    fields
}

pub fn refund_fields(booking: &Booking) -> TemplateFields {
    let mut fields = base_fields("REFUND PROCESSED", booking);
    fields.insert("refund_type".into(), format!("{:?}", booking.refund_status).to_uppercase());
    fields.insert("refund_amount".into(), format_cents(booking.refund_amount_cents));
    fields.insert("original_deposit".into(), format_cents(booking.deposit_paid_cents));
    fields.insert("remaining_balance".into(), format_cents(booking.remaining_balance_cents));
    fields.insert("refund_reason".into(), booking.refund_reason.clone().unwrap_or_else(|| "Admin processed".into()));
    fields.insert("refund_id".into(), booking.refund_id.clone().unwrap_or_else(|| "N/A".into()));
    fields
}
