//! Persisted records of the commission service.

pub mod affiliate;
pub mod catalog_item;
pub mod checkout;
pub mod commission;
pub mod order;

pub use affiliate::Affiliate;
pub use catalog_item::CatalogItem;
pub use checkout::{CheckoutLine, CheckoutStatus, PendingCheckout};
pub use commission::{Commission, CommissionStatus};
pub use order::{Order, OrderLine, OrderStatus};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Round a computed amount to cents (half away from zero).
///
/// `None` for non-finite amounts and amounts outside `Decimal`'s range.
pub fn to_money(amount: f64) -> Option<Decimal> {
    Decimal::from_f64(amount)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Amount in minor currency units (cents).
pub fn to_minor_units(amount: Decimal) -> Option<u64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
}

pub fn money_to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}
