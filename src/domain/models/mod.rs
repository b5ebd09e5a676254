pub mod analytics;
pub mod blocked_time;
pub mod booking;
pub mod personal_event;
pub mod settings;
