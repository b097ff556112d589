use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{floor_dp, fraction_to_percent, round_percent_1dp, MarginZone};
use crate::services::selection::{ItemMarginZones, MarginSaved};

fn pct(fraction: f64) -> f64 {
    round_percent_1dp(fraction_to_percent(fraction))
}

/// Upper bounds round down so the advertised value can be saved.
fn pct_ceiling(fraction: f64) -> f64 {
    floor_dp(fraction_to_percent(fraction), 1)
}

fn cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarginZonesResponse {
    pub item_id: Uuid,
    pub min_rate: f64,
    pub max_rate: f64,
    pub suggested_rate: f64,
    pub green_zone_end: f64,
    pub orange_zone_end: f64,
    pub is_sellable: bool,
    pub max_allowed_selling_price: f64,
    pub current_margin_rate: f64,
    pub current_zone: MarginZone,
}

impl From<ItemMarginZones> for MarginZonesResponse {
    fn from(view: ItemMarginZones) -> Self {
        let zones = view.zones;
        Self {
            item_id: view.item.item_id,
            min_rate: pct(zones.min_rate),
            max_rate: pct_ceiling(zones.max_rate),
            suggested_rate: pct(zones.suggested_rate),
            green_zone_end: pct(zones.green_zone_end),
            orange_zone_end: pct_ceiling(zones.orange_zone_end),
            is_sellable: zones.is_sellable,
            max_allowed_selling_price: floor_dp(zones.max_allowed_selling_price, 2),
            current_margin_rate: view.item.margin_rate,
            current_zone: view.current_zone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveMarginRequest {
    /// Percentage, e.g. `12.5`.
    pub margin_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveMarginResponse {
    pub item_id: Uuid,
    pub margin_rate: f64,
    pub final_customer_price: f64,
    pub affiliate_take_home: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<MarginZone>,
}

impl From<MarginSaved> for SaveMarginResponse {
    fn from(saved: MarginSaved) -> Self {
        Self {
            item_id: saved.item.item_id,
            margin_rate: saved.item.margin_rate,
            final_customer_price: cents(saved.price.final_customer_price),
            affiliate_take_home: cents(saved.price.affiliate_take_home),
            zone: saved.zone,
        }
    }
}
