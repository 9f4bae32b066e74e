pub mod analysis;
pub mod auth;
pub mod chat;
pub mod health;
pub mod health_logs;
pub mod reports;
