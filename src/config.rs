use chrono_tz::Tz;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub admin_token: String,
    pub business_timezone: Tz,
    pub payment_api_url: String,
    pub payment_access_token: String,
    pub payment_location_id: String,
    pub payment_currency: String,
    pub notifier_url: String,
    pub external_call_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().expect("PORT must be a number"),
            admin_token: env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN must be set (bearer token for admin routes)"),
            business_timezone: env::var("BUSINESS_TIMEZONE")
                .unwrap_or_else(|_| "America/New_York".to_string())
                .parse()
                .expect("BUSINESS_TIMEZONE must be an IANA timezone name"),
            payment_api_url: env::var("PAYMENT_API_URL").unwrap_or_else(|_| "https://connect.squareup.com".to_string()),
            payment_access_token: env::var("PAYMENT_ACCESS_TOKEN").unwrap_or_default(),
            payment_location_id: env::var("PAYMENT_LOCATION_ID").unwrap_or_default(),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            notifier_url: env::var("NOTIFIER_URL").unwrap_or_else(|_| "http://localhost:8000/notify".to_string()),
            external_call_timeout: Duration::from_secs(
                env::var("EXTERNAL_CALL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("EXTERNAL_CALL_TIMEOUT_SECS must be a number"),
            ),
        }
    }

    /// Current wall-clock time in the business timezone, without offset.
    pub fn local_now(&self) -> chrono::NaiveDateTime {
        chrono::Utc::now().with_timezone(&self.business_timezone).naive_local()
    }
}
