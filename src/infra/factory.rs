use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::background::{notification_channel, start_notification_worker};
use crate::config::Config;
use crate::domain::ports::{DocumentStore, Notifier, PaymentGateway};
use crate::infra::notifications::http_form_notifier::HttpFormNotifier;
use crate::infra::payments::square_gateway::SquarePaymentGateway;
use crate::infra::repositories::{
    file_document_store::FileDocumentStore, postgres_document_store::PostgresDocumentStore,
    sqlite_document_store::SqliteDocumentStore,
};
use crate::state::AppState;

/// Builds the document store named by `DATABASE_URL`, the payment gateway
/// and the notifier, and starts the notification worker.
pub async fn bootstrap_state(config: &Config) -> AppState {
    let store = open_document_store(&config.database_url).await;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(SquarePaymentGateway::new(
        config.payment_api_url.clone(),
        config.payment_access_token.clone(),
        config.payment_location_id.clone(),
        config.payment_currency.clone(),
        config.external_call_timeout,
    ));

    let notifier: Arc<dyn Notifier> = Arc::new(HttpFormNotifier::new(
        config.notifier_url.clone(),
        config.external_call_timeout,
    ));

    let (tx, rx) = notification_channel();
    tokio::spawn(start_notification_worker(rx, notifier, config.external_call_timeout));

    AppState::assemble(config.clone(), store, gateway, tx)
}

async fn open_document_store(database_url: &str) -> Arc<dyn DocumentStore> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse().expect("Invalid Postgres URL");
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .expect("Failed to connect to Postgres");

        run_postgres_migrations(&pool).await;
        Arc::new(PostgresDocumentStore::new(pool))
    } else if let Some(dir) = database_url.strip_prefix("file://") {
        info!("Using JSON file store in {}", dir);
        Arc::new(FileDocumentStore::open(dir).await.expect("Failed to open JSON file store"))
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .expect("Invalid SQLite connection string")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .expect("Failed to connect to SQLite");

        run_sqlite_migrations(&pool).await;
        Arc::new(SqliteDocumentStore::new(pool))
    }
}

async fn run_postgres_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .expect("Failed to run Postgres migrations");
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
