use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Commission, CommissionStatus, OrderStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct CommissionResponse {
    pub commission_id: Uuid,
    pub order_id: Uuid,
    pub affiliate_id: Uuid,
    pub order_amount_excl_tax: Decimal,
    pub affiliate_commission: Decimal,
    pub platform_commission: Decimal,
    pub margin_rate_applied: f64,
    pub platform_rate_applied: f64,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Commission> for CommissionResponse {
    fn from(c: Commission) -> Self {
        Self {
            commission_id: c.commission_id,
            order_id: c.order_id,
            affiliate_id: c.affiliate_id,
            order_amount_excl_tax: c.order_amount_excl_tax,
            affiliate_commission: c.affiliate_commission,
            platform_commission: c.platform_commission,
            margin_rate_applied: c.margin_rate_applied,
            platform_rate_applied: c.platform_rate_applied,
            status: c.status,
            created_at: c.created_utc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub commission_action: String,
}
