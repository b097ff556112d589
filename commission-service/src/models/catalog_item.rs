use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pricing::percent_to_fraction;

/// A supplier product an affiliate added to one of their selections.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: Uuid,
    pub selection_id: Uuid,
    pub affiliate_id: Uuid,
    pub product_id: Uuid,
    pub base_price_excl_tax: f64,
    /// Percentage chosen by the affiliate.
    pub margin_rate: f64,
    /// Known market reference price bounding the margin, when available.
    pub public_price_excl_tax: Option<f64>,
    pub updated_utc: DateTime<Utc>,
}

impl CatalogItem {
    pub fn margin_fraction(&self) -> f64 {
        percent_to_fraction(self.margin_rate)
    }
}
