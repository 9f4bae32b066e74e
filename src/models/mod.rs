pub mod analysis;
pub mod chat;
pub mod health_log;
pub mod report;
pub mod user;
