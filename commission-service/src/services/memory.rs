//! In-process commerce store used by tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::CommissionError;
use crate::models::{
    Affiliate, CatalogItem, CheckoutStatus, Commission, Order, OrderStatus, PendingCheckout,
};
use crate::services::store::CommerceStore;

#[derive(Default)]
struct Tables {
    affiliates: HashMap<Uuid, Affiliate>,
    items: HashMap<Uuid, CatalogItem>,
    /// Keyed by provider order id, which is unique per checkout.
    checkouts: HashMap<String, PendingCheckout>,
    orders: HashMap<Uuid, Order>,
    /// Keyed by order id.
    commissions: HashMap<Uuid, Commission>,
}

/// Mutex-guarded maps with the same uniqueness rules as the Postgres schema.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_recording: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, CommissionError> {
        self.tables
            .lock()
            .map_err(|_| CommissionError::Store(anyhow::anyhow!("store mutex poisoned")))
    }

    pub fn insert_affiliate(&self, affiliate: Affiliate) -> Result<(), CommissionError> {
        self.lock()?
            .affiliates
            .insert(affiliate.affiliate_id, affiliate);
        Ok(())
    }

    pub fn insert_item(&self, item: CatalogItem) -> Result<(), CommissionError> {
        self.lock()?.items.insert(item.item_id, item);
        Ok(())
    }

    /// Make every subsequent `record_confirmed_order` fail, simulating a
    /// database outage after payment capture.
    pub fn fail_recording(&self, fail: bool) {
        self.fail_recording.store(fail, Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.lock().map(|t| t.orders.len()).unwrap_or_default()
    }

    pub fn commission_count(&self) -> usize {
        self.lock().map(|t| t.commissions.len()).unwrap_or_default()
    }

    pub fn commissions(&self) -> Vec<Commission> {
        self.lock()
            .map(|t| t.commissions.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn order_by_provider_order(&self, provider_order_id: &str) -> Option<Order> {
        self.lock().ok().and_then(|t| {
            t.orders
                .values()
                .find(|o| o.provider_order_id == provider_order_id)
                .cloned()
        })
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), CommissionError> {
        self.lock().map(|_| ())
    }

    async fn get_affiliate(&self, affiliate_id: Uuid) -> Result<Option<Affiliate>, CommissionError> {
        Ok(self.lock()?.affiliates.get(&affiliate_id).cloned())
    }

    async fn get_catalog_item(&self, item_id: Uuid) -> Result<Option<CatalogItem>, CommissionError> {
        Ok(self.lock()?.items.get(&item_id).cloned())
    }

    async fn get_catalog_items(&self, item_ids: &[Uuid]) -> Result<Vec<CatalogItem>, CommissionError> {
        let tables = self.lock()?;
        Ok(item_ids
            .iter()
            .filter_map(|id| tables.items.get(id).cloned())
            .collect())
    }

    async fn update_margin_rate(
        &self,
        item_id: Uuid,
        margin_rate: f64,
    ) -> Result<CatalogItem, CommissionError> {
        let mut tables = self.lock()?;
        let item = tables
            .items
            .get_mut(&item_id)
            .ok_or_else(|| CommissionError::not_found(format!("catalog item {}", item_id)))?;
        item.margin_rate = margin_rate;
        item.updated_utc = Utc::now();
        Ok(item.clone())
    }

    async fn insert_checkout(&self, checkout: &PendingCheckout) -> Result<(), CommissionError> {
        let mut tables = self.lock()?;
        if tables.checkouts.contains_key(&checkout.provider_order_id) {
            return Err(CommissionError::Store(anyhow::anyhow!(
                "checkout for provider order {} already exists",
                checkout.provider_order_id
            )));
        }
        tables
            .checkouts
            .insert(checkout.provider_order_id.clone(), checkout.clone());
        Ok(())
    }

    async fn get_checkout_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PendingCheckout>, CommissionError> {
        Ok(self.lock()?.checkouts.get(provider_order_id).cloned())
    }

    async fn transition_checkout(
        &self,
        provider_order_id: &str,
        target: CheckoutStatus,
    ) -> Result<bool, CommissionError> {
        let mut tables = self.lock()?;
        match tables.checkouts.get_mut(provider_order_id) {
            Some(checkout) if CheckoutStatus::allowed_sources(target).contains(&checkout.status) => {
                checkout.status = target;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_confirmed_order(
        &self,
        order: &Order,
        commission: &Commission,
    ) -> Result<(), CommissionError> {
        if self.fail_recording.load(Ordering::SeqCst) {
            return Err(CommissionError::Store(anyhow::anyhow!(
                "simulated storage outage"
            )));
        }

        let mut tables = self.lock()?;
        if tables
            .orders
            .values()
            .any(|o| o.provider_order_id == order.provider_order_id)
        {
            return Err(CommissionError::DuplicateOrder(
                order.provider_order_id.clone(),
            ));
        }

        tables.orders.insert(order.order_id, order.clone());
        tables
            .commissions
            .entry(commission.order_id)
            .or_insert_with(|| commission.clone());
        if let Some(checkout) = tables.checkouts.get_mut(&order.provider_order_id) {
            if CheckoutStatus::allowed_sources(CheckoutStatus::Confirmed).contains(&checkout.status)
            {
                checkout.status = CheckoutStatus::Confirmed;
            }
        }
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, CommissionError> {
        Ok(self.lock()?.orders.get(&order_id).cloned())
    }

    async fn get_commission_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Commission>, CommissionError> {
        Ok(self.lock()?.commissions.get(&order_id).cloned())
    }

    async fn mark_order_refunded(&self, order_id: Uuid) -> Result<bool, CommissionError> {
        let mut tables = self.lock()?;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Confirmed => {
                order.status = OrderStatus::Refunded;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommissionStatus, OrderLine};
    use rust_decimal_macros::dec;
    use sqlx::types::Json;

    fn order(provider_order_id: &str) -> (Order, Commission) {
        let order = Order {
            order_id: Uuid::new_v4(),
            provider_order_id: provider_order_id.to_string(),
            merchant_order_ref: "LINKME-1-ABCDEFGHI".to_string(),
            affiliate_id: Uuid::new_v4(),
            selection_id: Uuid::new_v4(),
            lines: Json(Vec::<OrderLine>::new()),
            total_excl_tax: dec!(115.00),
            total_incl_tax: dec!(138.00),
            currency: "EUR".to_string(),
            status: OrderStatus::Confirmed,
            confirmed_utc: Utc::now(),
        };
        let commission = Commission {
            commission_id: Uuid::new_v4(),
            order_id: order.order_id,
            affiliate_id: order.affiliate_id,
            order_amount_excl_tax: dec!(115.00),
            affiliate_commission: dec!(10.00),
            platform_commission: dec!(5.00),
            margin_rate_applied: 10.0,
            platform_rate_applied: 5.0,
            status: CommissionStatus::Pending,
            created_utc: Utc::now(),
        };
        (order, commission)
    }

    #[tokio::test]
    async fn second_order_for_same_provider_order_is_duplicate() {
        let store = InMemoryStore::new();
        let (first, first_commission) = order("ord_1");
        let (second, second_commission) = order("ord_1");

        store
            .record_confirmed_order(&first, &first_commission)
            .await
            .unwrap();
        let err = store
            .record_confirmed_order(&second, &second_commission)
            .await
            .unwrap_err();

        assert!(matches!(err, CommissionError::DuplicateOrder(id) if id == "ord_1"));
        assert_eq!(store.order_count(), 1);
        assert_eq!(store.commission_count(), 1);
    }

    #[tokio::test]
    async fn refund_only_from_confirmed() {
        let store = InMemoryStore::new();
        let (order, commission) = order("ord_2");
        store.record_confirmed_order(&order, &commission).await.unwrap();

        assert!(store.mark_order_refunded(order.order_id).await.unwrap());
        assert!(!store.mark_order_refunded(order.order_id).await.unwrap());
        assert!(!store.mark_order_refunded(Uuid::new_v4()).await.unwrap());
    }
}
