use super::error::PricingError;
use super::zones::check_fraction;

/// Revenue split of a confirmed order between affiliate and platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionSplit {
    /// Order amount with commission and margin removed.
    pub net_base: f64,
    pub affiliate_commission: f64,
    pub platform_commission: f64,
}

/// Split an order amount (excl. tax) that was priced as
/// `base × (1 + platform_rate + margin_rate)` back into its components.
pub fn split_commission(
    order_amount_excl_tax: f64,
    platform_rate: f64,
    margin_rate: f64,
) -> Result<CommissionSplit, PricingError> {
    if !order_amount_excl_tax.is_finite() || order_amount_excl_tax < 0.0 {
        return Err(PricingError::invalid(format!(
            "order_amount_excl_tax must be a non-negative amount, got {}",
            order_amount_excl_tax
        )));
    }
    check_fraction("platform_rate", platform_rate)?;
    if !margin_rate.is_finite() || margin_rate < 0.0 {
        return Err(PricingError::invalid(format!(
            "margin_rate must be a non-negative decimal rate, got {}",
            margin_rate
        )));
    }

    let net_base = order_amount_excl_tax / (1.0 + platform_rate + margin_rate);
    Ok(CommissionSplit {
        net_base,
        affiliate_commission: net_base * margin_rate,
        platform_commission: net_base * platform_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_additively_priced_order() {
        // base 100 sold at 115 with 5% platform and 10% margin
        let split = split_commission(115.0, 0.05, 0.10).unwrap();
        assert!((split.net_base - 100.0).abs() < 1e-9);
        assert!((split.affiliate_commission - 10.0).abs() < 1e-9);
        assert!((split.platform_commission - 5.0).abs() < 1e-9);
    }

    #[test]
    fn components_sum_to_order_amount() {
        let split = split_commission(842.37, 0.07, 0.23).unwrap();
        let total = split.net_base + split.affiliate_commission + split.platform_commission;
        assert!((total - 842.37).abs() < 1e-9);
    }

    #[test]
    fn rejects_negative_amount() {
        assert!(split_commission(-1.0, 0.05, 0.1).is_err());
        assert!(split_commission(10.0, 0.05, -0.1).is_err());
    }
}
