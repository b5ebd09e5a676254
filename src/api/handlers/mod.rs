pub mod analytics;
pub mod availability;
pub mod blocked_time;
pub mod booking;
pub mod health;
pub mod personal_event;
pub mod settings;
pub mod transactions;
