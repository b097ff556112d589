use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::checkout::CheckoutLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Confirmed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub selection_item_id: Uuid,
    pub quantity: u32,
    pub unit_price_excl_tax: Decimal,
}

impl From<&CheckoutLine> for OrderLine {
    fn from(line: &CheckoutLine) -> Self {
        Self {
            product_id: line.product_id,
            selection_item_id: line.selection_item_id,
            quantity: line.quantity,
            unit_price_excl_tax: line.unit_price_excl_tax,
        }
    }
}

/// Immutable snapshot of a paid order. Only `confirmed → refunded` is allowed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub provider_order_id: String,
    pub merchant_order_ref: String,
    pub affiliate_id: Uuid,
    pub selection_id: Uuid,
    pub lines: Json<Vec<OrderLine>>,
    pub total_excl_tax: Decimal,
    pub total_incl_tax: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub confirmed_utc: DateTime<Utc>,
}
