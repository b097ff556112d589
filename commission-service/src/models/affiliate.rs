use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pricing::percent_to_fraction;

/// Partner curating a selection. Rates are percentages (`15.0` = 15%) and
/// are edited by platform operators only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Affiliate {
    pub affiliate_id: Uuid,
    pub display_name: String,
    pub default_margin_rate: f64,
    pub max_margin_rate: f64,
    pub platform_commission_rate: f64,
    pub created_utc: DateTime<Utc>,
}

impl Affiliate {
    pub fn platform_fee_fraction(&self) -> f64 {
        percent_to_fraction(self.platform_commission_rate)
    }

    pub fn default_margin_fraction(&self) -> f64 {
        percent_to_fraction(self.default_margin_rate)
    }
}
