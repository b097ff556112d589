//! Final price composition.
//!
//! Platform commission and affiliate margin are additive percentages of the
//! same base price; they are never compounded.

use super::error::PricingError;
use super::zones::{check_fraction, check_price, PricingSettings};
use serde::Serialize;

/// Relative slack when comparing a composed price against its ceiling, so a
/// margin equal to the computed maximum is accepted despite float rounding.
const CEILING_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComposedPrice {
    /// Base price plus the affiliate margin.
    pub affiliate_take_home: f64,
    /// Base price plus platform commission plus affiliate margin.
    pub final_customer_price: f64,
}

/// `final = base × (1 + commission + margin)`, `take_home = base × (1 + margin)`.
pub fn compose_final_price(
    base_price_excl_tax: f64,
    platform_commission_rate: f64,
    affiliate_margin_rate: f64,
) -> Result<ComposedPrice, PricingError> {
    check_price("base_price_excl_tax", base_price_excl_tax)?;
    check_fraction("platform_commission_rate", platform_commission_rate)?;
    check_margin(affiliate_margin_rate)?;

    Ok(ComposedPrice {
        affiliate_take_home: base_price_excl_tax * (1.0 + affiliate_margin_rate),
        final_customer_price: base_price_excl_tax
            * (1.0 + platform_commission_rate + affiliate_margin_rate),
    })
}

/// Re-derive the customer price for `affiliate_margin_rate` and reject it when
/// it exceeds `public × (1 − buffer)`.
pub fn validate_margin(
    base_price_excl_tax: f64,
    public_price_excl_tax: f64,
    platform_commission_rate: f64,
    affiliate_margin_rate: f64,
    settings: &PricingSettings,
) -> Result<ComposedPrice, PricingError> {
    check_price("public_price_excl_tax", public_price_excl_tax)?;
    let composed = compose_final_price(
        base_price_excl_tax,
        platform_commission_rate,
        affiliate_margin_rate,
    )?;

    let ceiling = settings.price_ceiling(public_price_excl_tax);
    if composed.final_customer_price > ceiling * (1.0 + CEILING_TOLERANCE) {
        let max_allowed_rate =
            (ceiling / base_price_excl_tax - 1.0 - platform_commission_rate).max(0.0);
        return Err(PricingError::MarginExceedsPublicPrice {
            requested_rate: affiliate_margin_rate,
            max_allowed_rate,
            max_allowed_selling_price: ceiling,
        });
    }

    Ok(composed)
}

fn check_margin(rate: f64) -> Result<(), PricingError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(PricingError::invalid(format!(
            "affiliate_margin_rate must be a non-negative decimal rate, got {}",
            rate
        )));
    }
    Ok(())
}
