use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Payment lifecycle of a checkout, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    Pending,
    Authorised,
    Confirmed,
    Failed,
    Cancelled,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorised => "authorised",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Cancelled)
    }

    /// States a checkout may move to `target` from. Terminal states never
    /// regress, so late or out-of-order events become no-ops.
    pub fn allowed_sources(target: CheckoutStatus) -> &'static [CheckoutStatus] {
        match target {
            Self::Pending => &[],
            Self::Authorised => &[Self::Pending],
            Self::Confirmed | Self::Failed | Self::Cancelled => {
                &[Self::Pending, Self::Authorised]
            }
        }
    }
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cart line frozen at checkout with its server-computed unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub selection_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price_excl_tax: Decimal,
    pub line_total_excl_tax: Decimal,
}

/// Frozen cart between provider order creation and payment confirmation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub checkout_id: Uuid,
    pub merchant_order_ref: String,
    pub provider_order_id: String,
    pub affiliate_id: Uuid,
    pub selection_id: Uuid,
    pub customer_email: String,
    pub lines: Json<Vec<CheckoutLine>>,
    pub total_excl_tax: Decimal,
    pub total_vat: Decimal,
    pub total_incl_tax: Decimal,
    pub amount_minor: i64,
    pub currency: String,
    pub status: CheckoutStatus,
    pub created_utc: DateTime<Utc>,
}
