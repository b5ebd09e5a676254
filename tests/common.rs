use appointment_backend::{
    api::router::create_router,
    background::{notification_channel, start_notification_worker},
    config::Config,
    domain::ports::{
        ChargeRequest, DocumentStore, GatewayPayment, GatewayRefund, Notifier, PaymentGateway,
        SavedCard, TemplateFields, BOOKINGS,
    },
    error::AppError,
    infra::factory::run_sqlite_migrations,
    infra::repositories::sqlite_document_store::SqliteDocumentStore,
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "test-admin-token";

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRefund {
    pub payment_id: String,
    pub amount_cents: i64,
    pub idempotency_key: String,
}

#[derive(Default)]
pub struct MockGateway {
    pub charges: Mutex<Vec<(i64, String)>>,
    pub refunds: Mutex<Vec<RecordedRefund>>,
    pub saved_cards: Mutex<Vec<String>>,
    pub payments: Mutex<Vec<GatewayPayment>>,
    /// Cards on file, keyed by customer email.
    pub cards_on_file: Mutex<Vec<(String, SavedCard)>>,
    pub fail_charges: AtomicBool,
    /// While set, each charge waits for `charge_released`.
    pub hold_charges: AtomicBool,
    pub charge_started: Notify,
    pub charge_released: Notify,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(&self, request: ChargeRequest<'_>) -> Result<GatewayPayment, AppError> {
        if self.hold_charges.load(Ordering::SeqCst) {
            self.charge_started.notify_one();
            self.charge_released.notified().await;
        }
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("Card declined.".to_string()));
        }
        let mut charges = self.charges.lock().unwrap();
        charges.push((request.amount_cents, request.idempotency_key.to_string()));
        Ok(GatewayPayment {
            id: format!("pay_{}", charges.len()),
            status: "COMPLETED".to_string(),
            amount_cents: request.amount_cents,
            currency: "USD".to_string(),
            created_at: Some(Utc::now()),
            note: Some(request.note.to_string()),
            receipt_url: None,
            card_brand: Some("VISA".to_string()),
            card_last4: Some("1111".to_string()),
        })
    }

    async fn refund(
        &self,
        payment_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
        _reason: &str,
    ) -> Result<GatewayRefund, AppError> {
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(RecordedRefund {
            payment_id: payment_id.to_string(),
            amount_cents,
            idempotency_key: idempotency_key.to_string(),
        });
        Ok(GatewayRefund { id: format!("ref_{}", refunds.len()), status: "PENDING".to_string() })
    }

    async fn find_customer(&self, email: &str) -> Result<Option<String>, AppError> {
        let cards = self.cards_on_file.lock().unwrap();
        Ok(cards.iter().any(|(owner, _)| owner == email).then(|| format!("cust_{}", email)))
    }

    async fn find_or_create_customer(
        &self,
        email: &str,
        _name: &str,
        _phone: &str,
    ) -> Result<String, AppError> {
        Ok(format!("cust_{}", email))
    }

    async fn save_card(&self, source_token: &str, _customer_id: &str) -> Result<String, AppError> {
        self.saved_cards.lock().unwrap().push(source_token.to_string());
        Ok("card_1".to_string())
    }

    async fn list_cards(&self, customer_id: &str) -> Result<Vec<SavedCard>, AppError> {
        let cards = self.cards_on_file.lock().unwrap();
        Ok(cards
            .iter()
            .filter(|(owner, _)| format!("cust_{}", owner) == customer_id)
            .map(|(_, card)| card.clone())
            .collect())
    }

    async fn list_recent_payments(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatewayPayment>, AppError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.created_at.is_none_or(|t| t >= since))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<TemplateFields>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, fields: &TemplateFields) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(fields.clone());
        Ok(())
    }
}

/// Passes everything through to SQLite, except that writes to the bookings
/// collection start failing once `booking_writes_left` reaches zero.
pub struct FlakyStore {
    inner: SqliteDocumentStore,
    pub booking_writes_left: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn fail_booking_writes_after(&self, writes: usize) {
        self.booking_writes_left.store(writes, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        self.inner.read_all(collection).await
    }

    async fn write_all(&self, collection: &str, documents: &[Value]) -> Result<(), AppError> {
        if collection == BOOKINGS {
            let allowed = self
                .booking_writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                    0 => None,
                    usize::MAX => Some(usize::MAX),
                    n => Some(n - 1),
                });
            if allowed.is_err() {
                return Err(AppError::Store("disk full".to_string()));
            }
        }
        self.inner.write_all(collection, documents).await
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub store: Arc<FlakyStore>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<MockNotifier>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        run_sqlite_migrations(&pool).await;

        let config = Config {
            database_url: db_url,
            port: 0,
            admin_token: ADMIN_TOKEN.to_string(),
            business_timezone: chrono_tz::UTC,
            payment_api_url: "http://localhost".to_string(),
            payment_access_token: "token".to_string(),
            payment_location_id: "loc".to_string(),
            payment_currency: "USD".to_string(),
            notifier_url: "http://localhost".to_string(),
            external_call_timeout: std::time::Duration::from_secs(2),
        };

        let store = Arc::new(FlakyStore {
            inner: SqliteDocumentStore::new(pool),
            booking_writes_left: AtomicUsize::new(usize::MAX),
        });
        let gateway = Arc::new(MockGateway::default());
        let notifier = Arc::new(MockNotifier::default());

        let (tx, rx) = notification_channel();
        tokio::spawn(start_notification_worker(rx, notifier.clone(), config.external_call_timeout));

        let state = Arc::new(AppState::assemble(config, store.clone(), gateway.clone(), tx));
        let router = create_router(state.clone());

        Self { router, db_filename, state, store, gateway, notifier }
    }

    /// A weekday far enough ahead that no past-time rule applies.
    pub fn future_weekday(&self) -> NaiveDate {
        let mut date = self.state.config.local_now().date() + Duration::days(10);
        while date.format("%a").to_string() == "Sun" {
            date += Duration::days(1);
        }
        date
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.router.clone().oneshot(
            Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
        ).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Response {
        self.router.clone().oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        ).await.unwrap()
    }

    pub async fn admin(&self, method: &str, uri: &str, body: Option<&Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    pub async fn available_slots(&self, date: NaiveDate, duration: u32) -> Vec<String> {
        let uri = format!("/api/v1/availability?date={}&duration={}", date, duration);
        let res = self.get(&uri).await;
        assert!(res.status().is_success(), "availability failed: {}", res.status());
        parse_body(res).await["available_slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap().to_string())
            .collect()
    }

    pub async fn stored_bookings(&self) -> Vec<Value> {
        self.store.read_all(BOOKINGS).await.unwrap()
    }

    /// Waits briefly for the notification worker to catch up.
    pub async fn sent_subjects(&self) -> Vec<String> {
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if !self.notifier.sent.lock().unwrap().is_empty() {
                break;
            }
        }
        self.notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.get("_subject").cloned().unwrap_or_default())
            .collect()
    }
}

#[allow(dead_code)]
pub async fn parse_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}
