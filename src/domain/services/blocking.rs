use crate::domain::models::blocked_time::{insert_unique, BlockReason, BlockedTimeEntry};
use crate::domain::models::booking::Booking;
use crate::domain::models::personal_event::PersonalEvent;
use crate::domain::ports::CollectionRepository;
use crate::domain::services::time_model::{
    all_slots, normalize_duration, required_slot_count, slot_window, Slot, FULL_DAY_MINUTES,
};
use crate::error::AppError;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const SUNDAY_BLOCK_DAYS: u32 = 90;

#[derive(Debug, Clone)]
pub struct NewPersonalEvent {
    pub date: NaiveDate,
    pub slot: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub duration_min: u32,
}

#[derive(Debug, Serialize)]
pub struct ToggleOutcome {
    pub date: NaiveDate,
    pub slot: Slot,
    pub blocked: bool,
    pub changed: bool,
}

/// A slot of a proposed event already taken by a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingClash {
    pub slot: Slot,
    pub customer: String,
}

/// Every booking whose own span (start slot plus its stored duration)
/// covers one of `window`'s slots on `date`.
pub fn booking_clashes(bookings: &[Booking], date: NaiveDate, window: &[Slot]) -> Vec<BookingClash> {
    let mut clashes = Vec::new();
    for slot in window {
        let hit = bookings
            .iter()
            .filter(|b| b.is_main_booking && b.date == date)
            .find(|b| {
                let start = b.slot.minutes();
                let end = start.saturating_add(normalize_duration(b.total_duration_min));
                (start..end).contains(&slot.minutes())
            });
        if let Some(booking) = hit {
            clashes.push(BookingClash { slot: *slot, customer: booking.customer.name.clone() });
        }
    }
    clashes
}

/// Personal events, manual blocks and the Sunday auto-block. Shares the
/// booking writer's lock, since both rewrite the blocked-times and
/// bookings collections wholesale.
pub struct BlockingManager {
    bookings: Arc<dyn CollectionRepository<Booking>>,
    blocked: Arc<dyn CollectionRepository<BlockedTimeEntry>>,
    events: Arc<dyn CollectionRepository<PersonalEvent>>,
    write_lock: Arc<Mutex<()>>,
}

impl BlockingManager {
    pub fn new(
        bookings: Arc<dyn CollectionRepository<Booking>>,
        blocked: Arc<dyn CollectionRepository<BlockedTimeEntry>>,
        events: Arc<dyn CollectionRepository<PersonalEvent>>,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self { bookings, blocked, events, write_lock }
    }

    pub async fn add_personal_event(&self, request: NewPersonalEvent) -> Result<PersonalEvent, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Event title is required".into()));
        }
        if request.duration_min == 0 {
            return Err(AppError::Validation("Event duration must be positive".into()));
        }

        let start = request.slot.as_deref().map(str::parse::<Slot>).transpose()?;
        let full_day = request.duration_min >= FULL_DAY_MINUTES;
        let window: Vec<Slot> = if full_day {
            all_slots().collect()
        } else {
            let start = start.ok_or_else(|| AppError::Validation("A start time is required".into()))?;
            slot_window(start, required_slot_count(request.duration_min))?
        };

        let _guard = self.write_lock.lock().await;

        let bookings = self.bookings.read_all().await?;
        let clashes = booking_clashes(&bookings, request.date, &window);
        if !clashes.is_empty() {
            let listed = clashes
                .iter()
                .map(|c| format!("{} ({})", c.slot, c.customer))
                .collect::<Vec<_>>()
                .join(", ");
            warn!(date = %request.date, "Personal event rejected, overlaps bookings: {}", listed);
            return Err(AppError::Conflict(format!("Personal event overlaps existing bookings: {}", listed)));
        }

        let event = PersonalEvent::new(
            request.date,
            if full_day { None } else { start },
            request.title,
            request.description,
            request.color,
            request.duration_min,
        );

        let mut events = self.events.read_all().await?;
        events.push(event.clone());
        self.events.write_all(&events).await?;

        let mut blocked = self.blocked.read_all().await?;
        let mut inserted = 0;
        for slot in &window {
            let mut entry = BlockedTimeEntry::new(event.date, *slot, BlockReason::PersonalEvent);
            entry.event_id = Some(event.id.clone());
            entry.event_title = Some(event.title.clone());
            if insert_unique(&mut blocked, entry) {
                inserted += 1;
            }
        }
        self.blocked.write_all(&blocked).await?;

        info!(
            event_id = %event.id,
            date = %event.date,
            full_day,
            slots_blocked = inserted,
            "Personal event added"
        );
        Ok(event)
    }

    /// Removes the event and every blocked entry tagged with its id.
    pub async fn delete_personal_event(&self, event_id: &str) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut events = self.events.read_all().await?;
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err(AppError::NotFound(format!("Personal event {}", event_id)));
        }
        self.events.write_all(&events).await?;

        let mut blocked = self.blocked.read_all().await?;
        let before = blocked.len();
        blocked.retain(|b| b.event_id.as_deref() != Some(event_id));
        let released = before - blocked.len();
        self.blocked.write_all(&blocked).await?;

        info!(event_id, released, "Personal event deleted");
        Ok(released)
    }

    pub async fn list_personal_events(&self, date: Option<NaiveDate>) -> Result<Vec<PersonalEvent>, AppError> {
        let mut events: Vec<PersonalEvent> = self
            .events
            .read_all()
            .await?
            .into_iter()
            .filter(|e| date.is_none_or(|d| e.date == d))
            .collect();
        events.sort_by_key(|e| (e.date, e.slot));
        Ok(events)
    }

    pub async fn toggle_slot(&self, date: NaiveDate, slot: &str, block: bool) -> Result<ToggleOutcome, AppError> {
        let slot: Slot = slot.parse()?;
        let _guard = self.write_lock.lock().await;

        let mut blocked = self.blocked.read_all().await?;
        let changed = if block {
            insert_unique(&mut blocked, BlockedTimeEntry::new(date, slot, BlockReason::Manual))
        } else {
            let before = blocked.len();
            blocked.retain(|b| !b.matches(date, slot));
            blocked.len() != before
        };

        if changed {
            self.blocked.write_all(&blocked).await?;
            info!(date = %date, slot = %slot, blocked = block, "Slot toggled");
        }
        Ok(ToggleOutcome { date, slot, blocked: block, changed })
    }

    /// Blocks every free slot of `date`; on the current day only slots
    /// after `now`.
    pub async fn block_rest_of_day(&self, date: NaiveDate, now: NaiveDateTime) -> Result<Vec<Slot>, AppError> {
        let _guard = self.write_lock.lock().await;

        let bookings = self.bookings.read_all().await?;
        let mut blocked = self.blocked.read_all().await?;

        let mut newly_blocked = Vec::new();
        for slot in all_slots() {
            if date == now.date() && slot.time() <= now.time() {
                continue;
            }
            if bookings.iter().any(|b| b.date == date && b.slot == slot) {
                continue;
            }
            if insert_unique(&mut blocked, BlockedTimeEntry::new(date, slot, BlockReason::Manual)) {
                newly_blocked.push(slot);
            }
        }

        if !newly_blocked.is_empty() {
            self.blocked.write_all(&blocked).await?;
        }
        info!(date = %date, count = newly_blocked.len(), "Rest of day blocked");
        Ok(newly_blocked)
    }

    /// Blocks every slot of each Sunday in `[from, from + days)`.
    /// Returns the number of Sundays covered.
    pub async fn block_sundays(&self, from: NaiveDate, days: u32) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut blocked = self.blocked.read_all().await?;
        let mut sundays = 0;
        let mut inserted = 0;

        for offset in 0..days {
            let date = from + Duration::days(i64::from(offset));
            if date.weekday() != Weekday::Sun {
                continue;
            }
            sundays += 1;
            for slot in all_slots() {
                if insert_unique(&mut blocked, BlockedTimeEntry::new(date, slot, BlockReason::AutoBlockSunday)) {
                    inserted += 1;
                }
            }
        }

        if inserted > 0 {
            self.blocked.write_all(&blocked).await?;
            info!(sundays, inserted, "Sundays auto-blocked");
        }
        Ok(sundays)
    }

    pub async fn list_blocked(&self, date: Option<NaiveDate>) -> Result<Vec<BlockedTimeEntry>, AppError> {
        let mut blocked: Vec<BlockedTimeEntry> = self
            .blocked
            .read_all()
            .await?
            .into_iter()
            .filter(|b| date.is_none_or(|d| b.date == d))
            .collect();
        blocked.sort_by_key(|b| (b.date, b.slot));
        Ok(blocked)
    }
}
