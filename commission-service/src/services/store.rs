//! Persistence boundary of the commission service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CommissionError;
use crate::models::{Affiliate, CatalogItem, CheckoutStatus, Commission, Order, PendingCheckout};

/// Storage for affiliates, selection items, checkouts, orders and
/// commissions.
///
/// Implementations must enforce uniqueness of `Order::provider_order_id`
/// and `Commission::order_id`; that uniqueness is what makes webhook
/// processing idempotent.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), CommissionError>;

    async fn get_affiliate(&self, affiliate_id: Uuid) -> Result<Option<Affiliate>, CommissionError>;

    async fn get_catalog_item(&self, item_id: Uuid) -> Result<Option<CatalogItem>, CommissionError>;

    /// Items among `item_ids` that exist. Missing ids are simply absent.
    async fn get_catalog_items(&self, item_ids: &[Uuid]) -> Result<Vec<CatalogItem>, CommissionError>;

    /// Persist a new margin (percentage) and return the updated item.
    async fn update_margin_rate(
        &self,
        item_id: Uuid,
        margin_rate: f64,
    ) -> Result<CatalogItem, CommissionError>;

    async fn insert_checkout(&self, checkout: &PendingCheckout) -> Result<(), CommissionError>;

    async fn get_checkout_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PendingCheckout>, CommissionError>;

    /// Move a checkout to `target` if its current status allows it.
    /// Returns whether a row changed.
    async fn transition_checkout(
        &self,
        provider_order_id: &str,
        target: CheckoutStatus,
    ) -> Result<bool, CommissionError>;

    /// Atomically write the order, its commission and mark the checkout
    /// confirmed. Fails with `DuplicateOrder` when an order for the same
    /// provider order already exists, leaving existing rows untouched.
    async fn record_confirmed_order(
        &self,
        order: &Order,
        commission: &Commission,
    ) -> Result<(), CommissionError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, CommissionError>;

    async fn get_commission_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Commission>, CommissionError>;

    /// `confirmed → refunded`. Returns false if the order was not confirmed.
    async fn mark_order_refunded(&self, order_id: Uuid) -> Result<bool, CommissionError>;
}
