//! Visitor and booking-funnel tracking, plus the read-only dashboard
//! derived from bookings and the tracked state.

use crate::domain::models::analytics::{AnalyticsState, Conversion, ConversionStatus, DailyStats, VisitorSession};
use crate::domain::models::booking::Booking;
use crate::domain::ports::CollectionRepository;
use crate::error::AppError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const SESSION_RETENTION_DAYS: i64 = 90;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const TOP_CUSTOMER_LIMIT: usize = 10;
const TREND_DAYS: i64 = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct VisitorEvent {
    pub session_id: String,
    #[serde(default)]
    pub is_returning: bool,
    pub timestamp: i64,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingStartedEvent {
    pub session_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingCompletedEvent {
    pub session_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub services: Vec<String>,
    pub booking_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub time_to_book_ms: Option<i64>,
}

/// Process-wide analytics accumulator. Loaded on first use, written back
/// after every tracked event.
pub struct AnalyticsTracker {
    repo: Arc<dyn CollectionRepository<AnalyticsState>>,
    cache: Mutex<Option<AnalyticsState>>,
}

impl AnalyticsTracker {
    pub fn new(repo: Arc<dyn CollectionRepository<AnalyticsState>>) -> Self {
        Self { repo, cache: Mutex::new(None) }
    }

    pub async fn snapshot(&self) -> Result<AnalyticsState, AppError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache.clone().unwrap_or_default())
    }

    async fn load(&self) -> Result<AnalyticsState, AppError> {
        Ok(self.repo.read_all().await?.into_iter().next().unwrap_or_default())
    }

    /// Applies `change` to a copy of the state and swaps it in once stored.
    async fn update<F>(&self, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut AnalyticsState),
    {
        let mut cache = self.cache.lock().await;
        let mut next = match cache.as_ref() {
            Some(state) => state.clone(),
            None => self.load().await?,
        };
        change(&mut next);
        self.repo.write_all(std::slice::from_ref(&next)).await?;
        *cache = Some(next);
        Ok(())
    }

    pub async fn track_visitor(&self, event: VisitorEvent, today: NaiveDate, now_ms: i64) -> Result<(), AppError> {
        debug!(session_id = %event.session_id, returning = event.is_returning, "Tracking visitor");
        self.update(|state| {
            state.visitors.total += 1;
            if event.is_returning {
                state.visitors.returning += 1;
            } else {
                state.visitors.new += 1;
            }

            let day = state.day_mut(today);
            day.visitors += 1;
            if event.is_returning {
                day.returning_visitors += 1;
            } else {
                day.new_visitors += 1;
            }

            state.visitors.sessions.push(VisitorSession {
                session_id: event.session_id,
                is_returning: event.is_returning,
                timestamp: event.timestamp,
                user_agent: event.user_agent,
                referrer: event.referrer,
                date: Some(today),
            });

            let cutoff = now_ms - SESSION_RETENTION_DAYS * DAY_MS;
            state.visitors.sessions.retain(|s| s.timestamp > cutoff);
        })
        .await
    }

    pub async fn track_booking_started(&self, event: BookingStartedEvent, today: NaiveDate) -> Result<(), AppError> {
        self.update(|state| {
            state.bookings.started += 1;
            state.bookings.conversions.push(Conversion {
                session_id: event.session_id,
                timestamp: event.timestamp,
                services: event.services,
                date: today,
                status: ConversionStatus::Started,
                booking_id: None,
                amount_cents: None,
                time_to_book_ms: None,
            });
            state.day_mut(today).bookings_started += 1;
        })
        .await
    }

    /// Closes the session's open conversion, or records a completed one
    /// when the start was never seen.
    pub async fn track_booking_completed(&self, event: BookingCompletedEvent, today: NaiveDate) -> Result<(), AppError> {
        self.update(|state| {
            state.bookings.completed += 1;

            let open = state
                .bookings
                .conversions
                .iter_mut()
                .find(|c| c.session_id == event.session_id && c.status == ConversionStatus::Started);

            match open {
                Some(conversion) => {
                    conversion.status = ConversionStatus::Completed;
                    conversion.booking_id = event.booking_id;
                    conversion.amount_cents = event.amount_cents;
                    conversion.time_to_book_ms = event.time_to_book_ms;
                }
                None => state.bookings.conversions.push(Conversion {
                    session_id: event.session_id,
                    timestamp: event.timestamp,
                    services: event.services,
                    date: today,
                    status: ConversionStatus::Completed,
                    booking_id: event.booking_id,
                    amount_cents: event.amount_cents,
                    time_to_book_ms: event.time_to_book_ms,
                }),
            }

            state.day_mut(today).bookings_completed += 1;
        })
        .await
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Summary {
    pub total_visitors: u64,
    pub new_visitors: u64,
    pub returning_visitors: u64,
    pub bookings_started: u64,
    pub bookings_completed: u64,
    pub conversion_rate: f64,
    pub total_revenue_cents: i64,
    pub avg_booking_value_cents: i64,
    pub total_customers: usize,
    pub recurring_customers: usize,
    pub new_customers: usize,
    pub recurring_customer_rate: f64,
    pub avg_bookings_per_customer: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RevenueSummary {
    pub today_cents: i64,
    pub week_cents: i64,
    pub month_cents: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CustomerSpend {
    pub customer: String,
    pub booking_count: usize,
    pub total_spent_cents: i64,
    pub avg_booking_value_cents: i64,
    pub favorite_service: Option<String>,
    pub is_recurring: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CustomerSegments {
    pub total: usize,
    pub recurring: usize,
    pub new: usize,
    pub top_customers: Vec<CustomerSpend>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ServicePopularity {
    pub name: String,
    pub count: usize,
    pub revenue_cents: i64,
    pub unique_customers: usize,
    pub rebook_rate: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DayPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub stats: DailyStats,
    pub revenue_cents: i64,
    pub bookings: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Dashboard {
    pub summary: Summary,
    pub revenue: RevenueSummary,
    pub customers: CustomerSegments,
    pub services: Vec<ServicePopularity>,
    pub today: DayPoint,
    pub last_30_days: Vec<DayPoint>,
    pub last_reset: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceCategory {
    Brow,
    Lash,
    TeethWhitening,
    Facial,
    Waxing,
    Other,
}

impl ServiceCategory {
    pub fn classify(service_name: &str) -> Self {
        let name = service_name.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));
        if has(&["brow", "lamination"]) {
            ServiceCategory::Brow
        } else if has(&["lash", "extension", "lift"]) {
            ServiceCategory::Lash
        } else if has(&["teeth", "whitening"]) {
            ServiceCategory::TeethWhitening
        } else if has(&["facial", "ear candling"]) {
            ServiceCategory::Facial
        } else if has(&["wax", "brazilian", "leg"]) {
            ServiceCategory::Waxing
        } else {
            ServiceCategory::Other
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: ServiceCategory,
    pub count: usize,
}

/// Percentage rounded to `decimals` places; zero when `whole` is zero.
fn percent_rounded(part: usize, whole: usize, decimals: i32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let scale = 10f64.powi(decimals);
    (part as f64 / whole as f64 * 100.0 * scale).round() / scale
}

fn percent(part: usize, whole: usize) -> f64 {
    percent_rounded(part, whole, 1)
}

fn revenue_between(bookings: &[&Booking], from: NaiveDate, to: NaiveDate) -> i64 {
    bookings
        .iter()
        .filter(|b| b.date >= from && b.date <= to)
        .map(|b| b.total_amount_cents)
        .sum()
}

struct CustomerHistory<'a> {
    bookings: Vec<&'a Booking>,
    total_spent_cents: i64,
    services: BTreeMap<&'a str, usize>,
}

pub fn dashboard(bookings: &[Booking], state: &AnalyticsState, today: NaiveDate) -> Dashboard {
    let primaries: Vec<&Booking> = bookings.iter().filter(|b| b.is_main_booking).collect();

    let mut customers: HashMap<&str, CustomerHistory<'_>> = HashMap::new();
    for &booking in &primaries {
        let history = customers.entry(booking.customer.key()).or_insert_with(|| CustomerHistory {
            bookings: Vec::new(),
            total_spent_cents: 0,
            services: BTreeMap::new(),
        });
        history.bookings.push(booking);
        history.total_spent_cents += booking.total_amount_cents;
        for service in &booking.services {
            *history.services.entry(service.name.as_str()).or_default() += 1;
        }
    }

    let total_customers = customers.len();
    let recurring = customers.values().filter(|c| c.bookings.len() >= 2).count();
    let total_revenue_cents: i64 = primaries.iter().map(|b| b.total_amount_cents).sum();
    let avg_booking_value_cents = if primaries.is_empty() { 0 } else { total_revenue_cents / primaries.len() as i64 };

    let summary = Summary {
        total_visitors: state.visitors.total,
        new_visitors: state.visitors.new,
        returning_visitors: state.visitors.returning,
        bookings_started: state.bookings.started,
        bookings_completed: state.bookings.completed,
        conversion_rate: percent_rounded(
            state.bookings.completed as usize,
            state.visitors.total as usize,
            2,
        ),
        total_revenue_cents,
        avg_booking_value_cents,
        total_customers,
        recurring_customers: recurring,
        new_customers: total_customers - recurring,
        recurring_customer_rate: percent(recurring, total_customers),
        avg_bookings_per_customer: if total_customers == 0 {
            0.0
        } else {
            (primaries.len() as f64 / total_customers as f64 * 10.0).round() / 10.0
        },
    };

    let revenue = RevenueSummary {
        today_cents: revenue_between(&primaries, today, today),
        week_cents: revenue_between(&primaries, today - Duration::days(6), today),
        month_cents: revenue_between(&primaries, today - Duration::days(TREND_DAYS - 1), today),
    };

    let mut top: Vec<CustomerSpend> = customers
        .iter()
        .map(|(key, history)| CustomerSpend {
            customer: key.to_string(),
            booking_count: history.bookings.len(),
            total_spent_cents: history.total_spent_cents,
            avg_booking_value_cents: history.total_spent_cents / history.bookings.len() as i64,
            favorite_service: history
                .services
                .iter()
                .max_by_key(|(_, count)| **count)
                .map(|(name, _)| name.to_string()),
            is_recurring: history.bookings.len() >= 2,
        })
        .collect();
    top.sort_by(|a, b| b.total_spent_cents.cmp(&a.total_spent_cents).then_with(|| a.customer.cmp(&b.customer)));
    top.truncate(TOP_CUSTOMER_LIMIT);

    let segments = CustomerSegments {
        total: total_customers,
        recurring,
        new: total_customers - recurring,
        top_customers: top,
    };

    let services = service_popularity(&primaries, &customers);

    let day_point = |date: NaiveDate| {
        let day_bookings: Vec<&Booking> = primaries.iter().copied().filter(|b| b.date == date).collect();
        DayPoint {
            date,
            stats: state.daily_stats.get(&date).copied().unwrap_or_default(),
            revenue_cents: day_bookings.iter().map(|b| b.total_amount_cents).sum(),
            bookings: day_bookings.len(),
        }
    };
    let last_30_days = (0..TREND_DAYS).rev().map(|i| day_point(today - Duration::days(i))).collect();

    Dashboard {
        summary,
        revenue,
        customers: segments,
        services,
        today: day_point(today),
        last_30_days,
        last_reset: state.last_reset,
    }
}

fn service_popularity(primaries: &[&Booking], customers: &HashMap<&str, CustomerHistory<'_>>) -> Vec<ServicePopularity> {
    struct Tally<'a> {
        count: usize,
        revenue_cents: i64,
        customers: HashSet<&'a str>,
    }

    let mut tallies: BTreeMap<&str, Tally<'_>> = BTreeMap::new();
    for &booking in primaries {
        for service in &booking.services {
            let tally = tallies.entry(service.name.as_str()).or_insert_with(|| Tally {
                count: 0,
                revenue_cents: 0,
                customers: HashSet::new(),
            });
            tally.count += 1;
            tally.revenue_cents += service.price_cents;
            tally.customers.insert(booking.customer.key());
        }
    }

    let mut popular: Vec<ServicePopularity> = tallies
        .into_iter()
        .map(|(name, tally)| {
            let rebooked = tally
                .customers
                .iter()
                .filter(|key| {
                    customers
                        .get(*key)
                        .and_then(|h| h.services.get(name))
                        .is_some_and(|count| *count > 1)
                })
                .count();
            ServicePopularity {
                name: name.to_string(),
                count: tally.count,
                revenue_cents: tally.revenue_cents,
                unique_customers: tally.customers.len(),
                rebook_rate: percent(rebooked, tally.customers.len()),
            }
        })
        .collect();
    popular.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    popular
}

/// Service counts by category over the last 30 days, empty categories
/// omitted.
pub fn category_breakdown(bookings: &[Booking], today: NaiveDate) -> Vec<CategoryCount> {
    let since = today - Duration::days(TREND_DAYS);
    let mut counts: BTreeMap<ServiceCategory, usize> = BTreeMap::new();
    for booking in bookings.iter().filter(|b| b.is_main_booking && b.date >= since) {
        for service in &booking.services {
            *counts.entry(ServiceCategory::classify(&service.name)).or_default() += 1;
        }
    }
    counts.into_iter().map(|(category, count)| CategoryCount { category, count }).collect()
}
