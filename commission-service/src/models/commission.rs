use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payout lifecycle. Only `Pending` is written by this service; later
/// states belong to settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Validated,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Commission ledger entry, exactly one per order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Commission {
    pub commission_id: Uuid,
    pub order_id: Uuid,
    pub affiliate_id: Uuid,
    pub order_amount_excl_tax: Decimal,
    pub affiliate_commission: Decimal,
    pub platform_commission: Decimal,
    /// Percentage taken from the affiliate record at confirmation time.
    pub margin_rate_applied: f64,
    pub platform_rate_applied: f64,
    pub status: CommissionStatus,
    pub created_utc: DateTime<Utc>,
}
