use crate::domain::ports::{ChargeRequest, GatewayPayment, GatewayRefund, PaymentGateway, SavedCard};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

const API_VERSION: &str = "2024-01-18";

/// Square-style REST payment gateway.
pub struct SquarePaymentGateway {
    client: Client,
    base_url: String,
    access_token: String,
    location_id: String,
    currency: String,
}

#[derive(Deserialize)]
struct Money {
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct Card {
    card_brand: Option<String>,
    last_4: Option<String>,
}

#[derive(Deserialize)]
struct CardDetails {
    card: Option<Card>,
}

#[derive(Deserialize)]
struct Payment {
    id: String,
    status: String,
    amount_money: Option<Money>,
    created_at: Option<DateTime<Utc>>,
    note: Option<String>,
    receipt_url: Option<String>,
    card_details: Option<CardDetails>,
}

impl From<Payment> for GatewayPayment {
    fn from(p: Payment) -> Self {
        let card = p.card_details.and_then(|d| d.card);
        let (amount_cents, currency) = p
            .amount_money
            .map(|m| (m.amount, m.currency))
            .unwrap_or((0, "USD".into()));
        GatewayPayment {
            id: p.id,
            status: p.status,
            amount_cents,
            currency,
            created_at: p.created_at,
            note: p.note,
            receipt_url: p.receipt_url,
            card_brand: card.as_ref().and_then(|c| c.card_brand.clone()),
            card_last4: card.and_then(|c| c.last_4),
        }
    }
}

#[derive(Deserialize)]
struct PaymentEnvelope {
    payment: Payment,
}

#[derive(Deserialize)]
struct PaymentList {
    #[serde(default)]
    payments: Vec<Payment>,
}

#[derive(Deserialize)]
struct RefundEnvelope {
    refund: GatewayRefund,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct CustomerEnvelope {
    customer: IdOnly,
}

#[derive(Deserialize)]
struct CustomerSearch {
    #[serde(default)]
    customers: Vec<IdOnly>,
}

#[derive(Deserialize)]
struct CardEnvelope {
    card: IdOnly,
}

#[derive(Deserialize)]
struct StoredCard {
    id: String,
    last_4: Option<String>,
    card_brand: Option<String>,
    exp_month: Option<u32>,
    exp_year: Option<u32>,
    #[serde(default)]
    enabled: bool,
}

impl From<StoredCard> for SavedCard {
    fn from(c: StoredCard) -> Self {
        SavedCard {
            id: c.id,
            last4: c.last_4,
            card_brand: c.card_brand,
            exp_month: c.exp_month,
            exp_year: c.exp_year,
            enabled: c.enabled,
        }
    }
}

#[derive(Deserialize)]
struct CardList {
    #[serde(default)]
    cards: Vec<StoredCard>,
}

#[derive(Serialize)]
struct MoneyBody<'a> {
    amount: i64,
    currency: &'a str,
}

/// First `errors[].detail` of a provider error body, if any.
fn provider_detail(body: &Value) -> Option<String> {
    body.get("errors")
        .and_then(|e| e.as_array())
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("detail").or_else(|| first.get("code")))
        .and_then(|d| d.as_str())
        .map(str::to_string)
}

impl SquarePaymentGateway {
    pub fn new(
        base_url: String,
        access_token: String,
        location_id: String,
        currency: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            location_id,
            currency,
        }
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<R, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.access_token)
            .header("Square-Version", API_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            let msg = format!("payment provider unreachable: {}", e);
            error!("{}", msg);
            AppError::Gateway(msg)
        })?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let detail = provider_detail(&payload).unwrap_or_else(|| format!("status {}", status));
            error!("Payment provider rejected {}: {}", path, detail);
            return Err(AppError::Gateway(detail));
        }

        serde_json::from_value(payload).map_err(|e| {
            error!("Unexpected payment provider response for {}: {}", path, e);
            AppError::Gateway(format!("unexpected response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for SquarePaymentGateway {
    #[instrument(skip(self, request), fields(amount_cents = request.amount_cents))]
    async fn charge(&self, request: ChargeRequest<'_>) -> Result<GatewayPayment, AppError> {
        let body = json!({
            "source_id": request.source_id,
            "idempotency_key": request.idempotency_key,
            "amount_money": MoneyBody { amount: request.amount_cents, currency: &self.currency },
            "location_id": self.location_id,
            "buyer_email_address": request.buyer_email,
            "note": request.note,
            "autocomplete": true,
        });
        let envelope: PaymentEnvelope = self.call(Method::POST, "/v2/payments", Some(body)).await?;
        info!(payment_id = %envelope.payment.id, status = %envelope.payment.status, "Payment created");
        Ok(envelope.payment.into())
    }

    #[instrument(skip(self, idempotency_key, reason))]
    async fn refund(
        &self,
        payment_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<GatewayRefund, AppError> {
        let body = json!({
            "idempotency_key": idempotency_key,
            "payment_id": payment_id,
            "amount_money": MoneyBody { amount: amount_cents, currency: &self.currency },
            "reason": reason,
        });
        let envelope: RefundEnvelope = self.call(Method::POST, "/v2/refunds", Some(body)).await?;
        Ok(envelope.refund)
    }

    async fn find_customer(&self, email: &str) -> Result<Option<String>, AppError> {
        if email.is_empty() {
            return Ok(None);
        }
        let search = json!({ "query": { "filter": { "email_address": { "exact": email } } } });
        let found: CustomerSearch = self.call(Method::POST, "/v2/customers/search", Some(search)).await?;
        Ok(found.customers.into_iter().next().map(|c| c.id))
    }

    async fn find_or_create_customer(
        &self,
        email: &str,
        name: &str,
        phone: &str,
    ) -> Result<String, AppError> {
        if let Some(existing) = self.find_customer(email).await? {
            return Ok(existing);
        }

        let (given, family) = name.split_once(' ').unwrap_or((name, ""));
        let body = json!({
            "idempotency_key": Uuid::new_v4().to_string(),
            "given_name": given,
            "family_name": family,
            "email_address": email,
            "phone_number": phone,
        });
        let created: CustomerEnvelope = self.call(Method::POST, "/v2/customers", Some(body)).await?;
        info!(customer_id = %created.customer.id, "Payment customer created");
        Ok(created.customer.id)
    }

    async fn save_card(&self, source_token: &str, customer_id: &str) -> Result<String, AppError> {
        let body = json!({
            "idempotency_key": Uuid::new_v4().to_string(),
            "source_id": source_token,
            "card": { "customer_id": customer_id },
        });
        let envelope: CardEnvelope = self.call(Method::POST, "/v2/cards", Some(body)).await?;
        Ok(envelope.card.id)
    }

    async fn list_cards(&self, customer_id: &str) -> Result<Vec<SavedCard>, AppError> {
        let path = format!("/v2/cards?customer_id={}", customer_id);
        let list: CardList = self.call(Method::GET, &path, None).await?;
        Ok(list.cards.into_iter().map(SavedCard::from).collect())
    }

    async fn list_recent_payments(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatewayPayment>, AppError> {
        let path = format!(
            "/v2/payments?begin_time={}&location_id={}&sort_order=DESC",
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.location_id
        );
        let list: PaymentList = self.call(Method::GET, &path, None).await?;
        Ok(list.payments.into_iter().map(GatewayPayment::from).collect())
    }
}
