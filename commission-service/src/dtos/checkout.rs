use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::PendingCheckout;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckoutLineRequest {
    pub item_id: Uuid,

    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub affiliate_id: Uuid,
    pub selection_id: Uuid,

    #[validate(email(message = "Invalid email format"))]
    pub customer_email: String,

    #[validate(
        length(min = 1, max = 100, message = "Between 1 and 100 lines required"),
        nested
    )]
    pub lines: Vec<CheckoutLineRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub total_excl_tax: Decimal,
    pub total_vat: Decimal,
    pub total_incl_tax: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_id: Uuid,
    pub order_ref: String,
    pub provider_order_id: String,
    /// Token for the provider's payment widget.
    pub checkout_token: Option<String>,
    pub totals: CheckoutTotals,
}

impl CheckoutResponse {
    pub fn new(checkout: &PendingCheckout, checkout_token: Option<String>) -> Self {
        Self {
            checkout_id: checkout.checkout_id,
            order_ref: checkout.merchant_order_ref.clone(),
            provider_order_id: checkout.provider_order_id.clone(),
            checkout_token,
            totals: CheckoutTotals {
                total_excl_tax: checkout.total_excl_tax,
                total_vat: checkout.total_vat,
                total_incl_tax: checkout.total_incl_tax,
                currency: checkout.currency.clone(),
            },
        }
    }
}
