//! HTTP handlers for commission-service.

pub mod checkout;
pub mod health;
pub mod items;
pub mod orders;
pub mod webhooks;

pub use health::{health_check, metrics, readiness_check};
