//! Margin and commission pricing engine.
//!
//! Everything in this module is pure: rates are decimal fractions
//! (`0.15` = 15%) and prices are `f64` amounts excluding tax. Conversions
//! from stored percentages and rounding to cents happen at the service
//! boundary, never here.

pub mod commission;
pub mod composer;
pub mod error;
pub mod zones;

pub use commission::{split_commission, CommissionSplit};
pub use composer::{compose_final_price, validate_margin, ComposedPrice};
pub use error::PricingError;
pub use zones::{
    compute_margin_zones, MarginResult, MarginZone, OneThirdHeadroom, PricingSettings,
    SuggestionPolicy,
};

/// Convert a stored percentage (`15.0`) to a decimal fraction (`0.15`).
pub fn percent_to_fraction(percent: f64) -> f64 {
    percent / 100.0
}

/// Convert a decimal fraction to a percentage.
pub fn fraction_to_percent(fraction: f64) -> f64 {
    fraction * 100.0
}

/// Round `value` down to `dp` decimals, ignoring float noise just below a
/// step. Used for upper bounds, so the reported value is itself allowed.
pub fn floor_dp(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    ((value * scale) + 1e-6).floor() / scale
}

/// Round a percentage to one decimal place for presentation.
pub fn round_percent_1dp(percent: f64) -> f64 {
    (percent * 10.0).round() / 10.0
}
