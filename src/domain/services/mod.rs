pub mod analytics;
pub mod availability;
pub mod blocking;
pub mod booking_writer;
pub mod notifications;
pub mod settings;
pub mod time_model;
