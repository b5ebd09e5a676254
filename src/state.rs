use crate::config::Config;
use crate::domain::models::analytics::AnalyticsState;
use crate::domain::models::blocked_time::BlockedTimeEntry;
use crate::domain::models::booking::Booking;
use crate::domain::models::personal_event::PersonalEvent;
use crate::domain::models::settings::AdminSettings;
use crate::domain::ports::{
    CollectionRepository, DocumentStore, PaymentGateway, TemplateFields, ADMIN_SETTINGS, ANALYTICS, BLOCKED_TIMES,
    BOOKINGS, PERSONAL_EVENTS,
};
use crate::domain::services::analytics::AnalyticsTracker;
use crate::domain::services::blocking::BlockingManager;
use crate::domain::services::booking_writer::BookingWriter;
use crate::domain::services::notifications::NotificationDispatcher;
use crate::domain::services::settings::SettingsService;
use crate::infra::repositories::document_collection::DocumentCollection;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub booking_repo: Arc<dyn CollectionRepository<Booking>>,
    pub blocked_repo: Arc<dyn CollectionRepository<BlockedTimeEntry>>,
    pub event_repo: Arc<dyn CollectionRepository<PersonalEvent>>,
    pub booking_writer: Arc<BookingWriter>,
    pub blocking: Arc<BlockingManager>,
    pub settings: Arc<SettingsService>,
    pub analytics: Arc<AnalyticsTracker>,
}

impl AppState {
    /// Wires every service over one document store. Notifications are
    /// queued on `notifications`; whoever holds the receiver delivers them.
    pub fn assemble(
        config: Config,
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: mpsc::UnboundedSender<TemplateFields>,
    ) -> Self {
        let booking_repo: Arc<dyn CollectionRepository<Booking>> =
            Arc::new(DocumentCollection::new(store.clone(), BOOKINGS));
        let blocked_repo: Arc<dyn CollectionRepository<BlockedTimeEntry>> =
            Arc::new(DocumentCollection::new(store.clone(), BLOCKED_TIMES));
        let event_repo: Arc<dyn CollectionRepository<PersonalEvent>> =
            Arc::new(DocumentCollection::new(store.clone(), PERSONAL_EVENTS));
        let settings_repo: Arc<dyn CollectionRepository<AdminSettings>> =
            Arc::new(DocumentCollection::new(store.clone(), ADMIN_SETTINGS));
        let analytics_repo: Arc<dyn CollectionRepository<AnalyticsState>> =
            Arc::new(DocumentCollection::new(store, ANALYTICS));

        let settings = Arc::new(SettingsService::new(settings_repo));
        let dispatcher = NotificationDispatcher::new(notifications, settings.clone());
        let write_lock = Arc::new(Mutex::new(()));

        let booking_writer = Arc::new(BookingWriter::new(
            booking_repo.clone(),
            blocked_repo.clone(),
            event_repo.clone(),
            gateway,
            dispatcher,
            write_lock.clone(),
        ));
        let blocking = Arc::new(BlockingManager::new(
            booking_repo.clone(),
            blocked_repo.clone(),
            event_repo.clone(),
            write_lock,
        ));

        Self {
            config,
            booking_repo,
            blocked_repo,
            event_repo,
            booking_writer,
            blocking,
            settings,
            analytics: Arc::new(AnalyticsTracker::new(analytics_repo)),
        }
    }
}
