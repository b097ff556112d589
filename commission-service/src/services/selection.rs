//! Margin management for affiliate selection items.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::CommissionError;
use crate::models::{Affiliate, CatalogItem};
use crate::pricing::{
    compose_final_price, compute_margin_zones, fraction_to_percent, percent_to_fraction,
    validate_margin, ComposedPrice, MarginResult, MarginZone, PricingError, PricingSettings,
};
use crate::services::metrics::MARGIN_SAVES_TOTAL;
use crate::services::store::CommerceStore;

/// Result of a successful margin save.
#[derive(Debug, Clone)]
pub struct MarginSaved {
    pub item: CatalogItem,
    pub price: ComposedPrice,
    /// Absent when the item has no public reference price.
    pub zone: Option<MarginZone>,
}

/// Advisory margin range of one item.
#[derive(Debug, Clone)]
pub struct ItemMarginZones {
    pub item: CatalogItem,
    pub zones: MarginResult,
    pub current_zone: MarginZone,
}

#[derive(Clone)]
pub struct SelectionService {
    store: Arc<dyn CommerceStore>,
    settings: PricingSettings,
}

impl SelectionService {
    pub fn new(store: Arc<dyn CommerceStore>, settings: PricingSettings) -> Self {
        Self { store, settings }
    }

    async fn load(&self, item_id: Uuid) -> Result<(CatalogItem, Affiliate), CommissionError> {
        let item = self
            .store
            .get_catalog_item(item_id)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("catalog item {}", item_id)))?;
        let affiliate = self
            .store
            .get_affiliate(item.affiliate_id)
            .await?
            .ok_or_else(|| {
                CommissionError::not_found(format!("affiliate {}", item.affiliate_id))
            })?;
        Ok((item, affiliate))
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn margin_zones(&self, item_id: Uuid) -> Result<ItemMarginZones, CommissionError> {
        let (item, affiliate) = self.load(item_id).await?;
        let public_price = item.public_price_excl_tax.ok_or_else(|| {
            PricingError::invalid(format!(
                "item {} has no public reference price",
                item.item_id
            ))
        })?;

        let zones = compute_margin_zones(
            item.base_price_excl_tax,
            public_price,
            affiliate.platform_fee_fraction(),
            &self.settings,
        )?;
        let current_zone = zones.classify(item.margin_fraction());

        Ok(ItemMarginZones {
            item,
            zones,
            current_zone,
        })
    }

    /// Validate and persist a margin (percentage) for an item.
    #[instrument(skip(self), fields(item_id = %item_id, margin_rate = margin_rate))]
    pub async fn save_margin(
        &self,
        item_id: Uuid,
        margin_rate: f64,
    ) -> Result<MarginSaved, CommissionError> {
        let result = self.try_save_margin(item_id, margin_rate).await;

        let outcome = match &result {
            Ok(_) => "saved",
            Err(CommissionError::Pricing(PricingError::MarginExceedsPublicPrice { .. })) => {
                "exceeds_public_price"
            }
            Err(CommissionError::Pricing(PricingError::NonSellableItem { .. })) => "non_sellable",
            Err(CommissionError::Pricing(PricingError::InvalidInput(_))) => "invalid",
            Err(_) => "error",
        };
        MARGIN_SAVES_TOTAL.with_label_values(&[outcome]).inc();

        if let Err(e) = &result {
            warn!(error = %e, outcome = outcome, "Margin save rejected");
        }
        result
    }

    async fn try_save_margin(
        &self,
        item_id: Uuid,
        margin_rate: f64,
    ) -> Result<MarginSaved, CommissionError> {
        let (item, affiliate) = self.load(item_id).await?;

        if !margin_rate.is_finite() || margin_rate < 0.0 {
            return Err(PricingError::invalid(format!(
                "margin_rate must be a non-negative percentage, got {}",
                margin_rate
            ))
            .into());
        }
        let fraction = percent_to_fraction(margin_rate);
        if fraction < self.settings.min_margin_rate {
            return Err(PricingError::invalid(format!(
                "margin_rate {}% is below the minimum of {}%",
                margin_rate,
                fraction_to_percent(self.settings.min_margin_rate)
            ))
            .into());
        }
        if margin_rate > affiliate.max_margin_rate {
            return Err(PricingError::invalid(format!(
                "margin_rate {}% exceeds the affiliate maximum of {}%",
                margin_rate, affiliate.max_margin_rate
            ))
            .into());
        }

        let platform_rate = affiliate.platform_fee_fraction();
        let (price, zone) = match item.public_price_excl_tax {
            Some(public_price) => {
                let zones = compute_margin_zones(
                    item.base_price_excl_tax,
                    public_price,
                    platform_rate,
                    &self.settings,
                )?;
                zones.ensure_sellable()?;
                let price = validate_margin(
                    item.base_price_excl_tax,
                    public_price,
                    platform_rate,
                    fraction,
                    &self.settings,
                )?;
                (price, Some(zones.classify(fraction)))
            }
            None => (
                compose_final_price(item.base_price_excl_tax, platform_rate, fraction)?,
                None,
            ),
        };

        let item = self.store.update_margin_rate(item.item_id, margin_rate).await?;

        info!(
            final_customer_price = price.final_customer_price,
            zone = ?zone,
            "Margin saved"
        );

        Ok(MarginSaved { item, price, zone })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::InMemoryStore;
    use chrono::Utc;

    fn seed(public: Option<f64>) -> (Arc<InMemoryStore>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let affiliate_id = Uuid::new_v4();
        store
            .insert_affiliate(Affiliate {
                affiliate_id,
                display_name: "Atelier".to_string(),
                default_margin_rate: 10.0,
                max_margin_rate: 50.0,
                platform_commission_rate: 5.0,
                created_utc: Utc::now(),
            })
            .unwrap();
        let item_id = Uuid::new_v4();
        store
            .insert_item(CatalogItem {
                item_id,
                selection_id: Uuid::new_v4(),
                affiliate_id,
                product_id: Uuid::new_v4(),
                base_price_excl_tax: 100.0,
                margin_rate: 10.0,
                public_price_excl_tax: public,
                updated_utc: Utc::now(),
            })
            .unwrap();
        (store, item_id)
    }

    fn service(store: Arc<InMemoryStore>) -> SelectionService {
        SelectionService::new(store, PricingSettings::default())
    }

    #[tokio::test]
    async fn saves_margin_within_bounds() {
        let (store, item_id) = seed(Some(150.0));
        let saved = service(store.clone()).save_margin(item_id, 20.0).await.unwrap();

        assert!((saved.price.final_customer_price - 125.0).abs() < 1e-9);
        assert!((saved.price.affiliate_take_home - 120.0).abs() < 1e-9);
        assert_eq!(saved.zone, Some(MarginZone::Orange));
        assert_eq!(saved.item.margin_rate, 20.0);
    }

    #[tokio::test]
    async fn rejects_margin_above_public_ceiling() {
        let (store, item_id) = seed(Some(150.0));
        let svc = service(store.clone());

        assert!(svc.save_margin(item_id, 37.5).await.is_ok());
        let err = svc.save_margin(item_id, 37.6).await.unwrap_err();
        assert!(matches!(
            err,
            CommissionError::Pricing(PricingError::MarginExceedsPublicPrice { .. })
        ));

        // failed save leaves the stored margin alone
        let item = store.get_catalog_item(item_id).await.unwrap().unwrap();
        assert_eq!(item.margin_rate, 37.5);
    }

    #[tokio::test]
    async fn enforces_floor_and_affiliate_cap() {
        let (store, item_id) = seed(None);
        let svc = service(store);

        for rate in [0.5, 51.0, -1.0, f64::NAN] {
            assert!(matches!(
                svc.save_margin(item_id, rate).await,
                Err(CommissionError::Pricing(PricingError::InvalidInput(_)))
            ));
        }
        let saved = svc.save_margin(item_id, 45.0).await.unwrap();
        assert_eq!(saved.zone, None);
    }

    #[tokio::test]
    async fn non_sellable_item_is_rejected() {
        let (store, item_id) = seed(Some(103.0));
        assert!(matches!(
            service(store).save_margin(item_id, 1.0).await,
            Err(CommissionError::Pricing(PricingError::NonSellableItem { .. }))
        ));
    }

    #[tokio::test]
    async fn zones_for_item() {
        let (store, item_id) = seed(Some(150.0));
        let view = service(store).margin_zones(item_id).await.unwrap();
        assert!((view.zones.max_rate - 0.375).abs() < 1e-9);
        assert_eq!(view.current_zone, MarginZone::Green);

        let (store, _) = seed(Some(150.0));
        assert!(matches!(
            service(store).margin_zones(Uuid::new_v4()).await,
            Err(CommissionError::NotFound(_))
        ));
    }
}
