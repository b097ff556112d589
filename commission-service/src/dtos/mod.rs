//! Request and response bodies of the HTTP API.
//!
//! Rates cross the wire as percentages; advisory rates are rounded to one
//! decimal here and nowhere else.

pub mod checkout;
pub mod items;
pub mod orders;
pub mod webhooks;
