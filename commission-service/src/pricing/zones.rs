//! Margin zone calculator.
//!
//! Derives how much margin an affiliate may add on top of a cost price
//! before the customer price crosses a buffered fraction of the public
//! reference price, and splits that headroom into advisory zones.

use super::error::PricingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Heuristic for the advisory "suggested" margin.
///
/// Implementations receive the maximum allowed margin (decimal fraction) and
/// return the suggestion; the calculator clamps the result into the allowed
/// range.
pub trait SuggestionPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn suggest(&self, max_rate: f64) -> f64;
}

/// Suggest one third of the available headroom.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneThirdHeadroom;

impl SuggestionPolicy for OneThirdHeadroom {
    fn name(&self) -> &'static str {
        "one_third_headroom"
    }

    fn suggest(&self, max_rate: f64) -> f64 {
        max_rate / 3.0
    }
}

/// Tunables of the pricing engine, injected rather than hard-coded.
#[derive(Debug, Clone)]
pub struct PricingSettings {
    /// Fraction kept between the selling price ceiling and the public price.
    pub buffer_rate: f64,
    /// Margin floor below which an item is not worth selling.
    pub min_margin_rate: f64,
    pub suggestion_policy: Arc<dyn SuggestionPolicy>,
}

impl PricingSettings {
    pub fn new(buffer_rate: f64, min_margin_rate: f64) -> Result<Self, PricingError> {
        check_fraction("buffer_rate", buffer_rate)?;
        check_fraction("min_margin_rate", min_margin_rate)?;
        Ok(Self {
            buffer_rate,
            min_margin_rate,
            suggestion_policy: Arc::new(OneThirdHeadroom),
        })
    }

    pub fn with_policy(mut self, policy: Arc<dyn SuggestionPolicy>) -> Self {
        self.suggestion_policy = policy;
        self
    }

    /// Highest customer price allowed for a given public price.
    pub fn price_ceiling(&self, public_price_excl_tax: f64) -> f64 {
        public_price_excl_tax * (1.0 - self.buffer_rate)
    }
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            buffer_rate: 0.05,
            min_margin_rate: 0.01,
            suggestion_policy: Arc::new(OneThirdHeadroom),
        }
    }
}

/// Traffic-light position of a margin within the allowed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginZone {
    /// Competitive price.
    Green,
    Orange,
    /// Close to the public price.
    Red,
}

/// Allowed margin range and advisory zones for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginResult {
    pub min_rate: f64,
    pub max_rate: f64,
    pub suggested_rate: f64,
    pub green_zone_end: f64,
    pub orange_zone_end: f64,
    pub is_sellable: bool,
    pub max_allowed_selling_price: f64,
}

impl MarginResult {
    pub fn classify(&self, rate: f64) -> MarginZone {
        if rate <= self.green_zone_end {
            MarginZone::Green
        } else if rate <= self.orange_zone_end {
            MarginZone::Orange
        } else {
            MarginZone::Red
        }
    }

    /// Fail with `NonSellableItem` when no margin above the floor fits.
    pub fn ensure_sellable(&self) -> Result<(), PricingError> {
        if self.is_sellable {
            Ok(())
        } else {
            Err(PricingError::NonSellableItem {
                max_rate: self.max_rate,
                min_rate: self.min_rate,
            })
        }
    }
}

/// Compute the allowed margin range for an item.
///
/// `max_rate = max(0, public × (1 − buffer) / cost − 1 − platform_fee)`.
/// An item is sellable only when `max_rate` exceeds the configured floor.
pub fn compute_margin_zones(
    cost_price_excl_tax: f64,
    public_price_excl_tax: f64,
    platform_fee_rate: f64,
    settings: &PricingSettings,
) -> Result<MarginResult, PricingError> {
    check_price("cost_price_excl_tax", cost_price_excl_tax)?;
    check_price("public_price_excl_tax", public_price_excl_tax)?;
    check_fraction("platform_fee_rate", platform_fee_rate)?;
    check_fraction("buffer_rate", settings.buffer_rate)?;

    let min_rate = settings.min_margin_rate;
    let max_allowed_selling_price = settings.price_ceiling(public_price_excl_tax);
    let max_rate =
        (max_allowed_selling_price / cost_price_excl_tax - 1.0 - platform_fee_rate).max(0.0);
    let is_sellable = max_rate > min_rate;

    let lower = if is_sellable { min_rate } else { 0.0 };
    let suggested_rate = settings
        .suggestion_policy
        .suggest(max_rate)
        .clamp(lower, max_rate);
    let orange_zone_end = (2.0 * suggested_rate).clamp(suggested_rate, max_rate);

    Ok(MarginResult {
        min_rate,
        max_rate,
        suggested_rate,
        green_zone_end: suggested_rate,
        orange_zone_end,
        is_sellable,
        max_allowed_selling_price,
    })
}

pub(crate) fn check_price(name: &str, value: f64) -> Result<(), PricingError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PricingError::invalid(format!(
            "{} must be a positive amount, got {}",
            name, value
        )));
    }
    Ok(())
}

pub(crate) fn check_fraction(name: &str, value: f64) -> Result<(), PricingError> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(PricingError::invalid(format!(
            "{} must be a decimal rate in [0, 1), got {}",
            name, value
        )));
    }
    Ok(())
}
