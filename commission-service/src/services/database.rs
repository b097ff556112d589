//! PostgreSQL implementation of the commerce store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::CommissionError;
use crate::models::{Affiliate, CatalogItem, CheckoutStatus, Commission, Order, PendingCheckout};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::CommerceStore;

const CHECKOUT_COLUMNS: &str = "checkout_id, merchant_order_ref, provider_order_id, affiliate_id, \
     selection_id, customer_email, lines, total_excl_tax, total_vat, total_incl_tax, amount_minor, \
     currency, status, created_utc";

const ORDER_COLUMNS: &str = "order_id, provider_order_id, merchant_order_ref, affiliate_id, \
     selection_id, lines, total_excl_tax, total_incl_tax, currency, status, confirmed_utc";

const COMMISSION_COLUMNS: &str = "commission_id, order_id, affiliate_id, order_amount_excl_tax, \
     affiliate_commission, platform_commission, margin_rate_applied, platform_rate_applied, \
     status, created_utc";

const ITEM_COLUMNS: &str = "item_id, selection_id, affiliate_id, product_id, base_price_excl_tax, \
     margin_rate, public_price_excl_tax, updated_utc";

fn db_error(context: &str, e: sqlx::Error) -> CommissionError {
    CommissionError::Store(anyhow::anyhow!("{}: {}", context, e))
}

/// Connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "commission-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, CommissionError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), CommissionError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CommissionError::Store(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), CommissionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(affiliate_id = %affiliate_id))]
    async fn get_affiliate(&self, affiliate_id: Uuid) -> Result<Option<Affiliate>, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_affiliate"])
            .start_timer();

        let affiliate = sqlx::query_as::<_, Affiliate>(
            r#"
            SELECT affiliate_id, display_name, default_margin_rate, max_margin_rate,
                   platform_commission_rate, created_utc
            FROM affiliates
            WHERE affiliate_id = $1
            "#,
        )
        .bind(affiliate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get affiliate", e))?;

        timer.observe_duration();
        Ok(affiliate)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn get_catalog_item(&self, item_id: Uuid) -> Result<Option<CatalogItem>, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_catalog_item"])
            .start_timer();

        let item = sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT {} FROM catalog_items WHERE item_id = $1",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get catalog item", e))?;

        timer.observe_duration();
        Ok(item)
    }

    #[instrument(skip(self, item_ids), fields(count = item_ids.len()))]
    async fn get_catalog_items(&self, item_ids: &[Uuid]) -> Result<Vec<CatalogItem>, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_catalog_items"])
            .start_timer();

        let items = sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT {} FROM catalog_items WHERE item_id = ANY($1)",
            ITEM_COLUMNS
        ))
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get catalog items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self), fields(item_id = %item_id, margin_rate = margin_rate))]
    async fn update_margin_rate(
        &self,
        item_id: Uuid,
        margin_rate: f64,
    ) -> Result<CatalogItem, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_margin_rate"])
            .start_timer();

        let item = sqlx::query_as::<_, CatalogItem>(&format!(
            r#"
            UPDATE catalog_items
            SET margin_rate = $2, updated_utc = NOW()
            WHERE item_id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(margin_rate)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update margin rate", e))?
        .ok_or_else(|| CommissionError::not_found(format!("catalog item {}", item_id)))?;

        timer.observe_duration();
        Ok(item)
    }

    #[instrument(skip(self, checkout), fields(provider_order_id = %checkout.provider_order_id))]
    async fn insert_checkout(&self, checkout: &PendingCheckout) -> Result<(), CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_checkout"])
            .start_timer();

        sqlx::query(&format!(
            "INSERT INTO checkouts ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            CHECKOUT_COLUMNS
        ))
        .bind(checkout.checkout_id)
        .bind(&checkout.merchant_order_ref)
        .bind(&checkout.provider_order_id)
        .bind(checkout.affiliate_id)
        .bind(checkout.selection_id)
        .bind(&checkout.customer_email)
        .bind(&checkout.lines)
        .bind(checkout.total_excl_tax)
        .bind(checkout.total_vat)
        .bind(checkout.total_incl_tax)
        .bind(checkout.amount_minor)
        .bind(&checkout.currency)
        .bind(checkout.status.as_str())
        .bind(checkout.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert checkout", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_checkout_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PendingCheckout>, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_checkout"])
            .start_timer();

        let checkout = sqlx::query_as::<_, PendingCheckout>(&format!(
            "SELECT {} FROM checkouts WHERE provider_order_id = $1",
            CHECKOUT_COLUMNS
        ))
        .bind(provider_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get checkout", e))?;

        timer.observe_duration();
        Ok(checkout)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn transition_checkout(
        &self,
        provider_order_id: &str,
        target: CheckoutStatus,
    ) -> Result<bool, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_checkout"])
            .start_timer();

        let sources: Vec<&str> = CheckoutStatus::allowed_sources(target)
            .iter()
            .map(CheckoutStatus::as_str)
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE checkouts
            SET status = $2
            WHERE provider_order_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(provider_order_id)
        .bind(target.as_str())
        .bind(&sources)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to transition checkout", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(
        skip(self, order, commission),
        fields(provider_order_id = %order.provider_order_id, order_id = %order.order_id)
    )]
    async fn record_confirmed_order(
        &self,
        order: &Order,
        commission: &Commission,
    ) -> Result<(), CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_confirmed_order"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO orders ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (provider_order_id) DO NOTHING",
            ORDER_COLUMNS
        ))
        .bind(order.order_id)
        .bind(&order.provider_order_id)
        .bind(&order.merchant_order_ref)
        .bind(order.affiliate_id)
        .bind(order.selection_id)
        .bind(&order.lines)
        .bind(order.total_excl_tax)
        .bind(order.total_incl_tax)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(order.confirmed_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert order", e))?;

        if inserted.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| db_error("Failed to roll back", e))?;
            timer.observe_duration();
            return Err(CommissionError::DuplicateOrder(
                order.provider_order_id.clone(),
            ));
        }

        let commission_rows = sqlx::query(&format!(
            "INSERT INTO commissions ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (order_id) DO NOTHING",
            COMMISSION_COLUMNS
        ))
        .bind(commission.commission_id)
        .bind(commission.order_id)
        .bind(commission.affiliate_id)
        .bind(commission.order_amount_excl_tax)
        .bind(commission.affiliate_commission)
        .bind(commission.platform_commission)
        .bind(commission.margin_rate_applied)
        .bind(commission.platform_rate_applied)
        .bind(commission.status.as_str())
        .bind(commission.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert commission", e))?;

        if commission_rows.rows_affected() == 0 {
            warn!(order_id = %order.order_id, "Commission already present for new order");
        }

        let sources: Vec<&str> = CheckoutStatus::allowed_sources(CheckoutStatus::Confirmed)
            .iter()
            .map(CheckoutStatus::as_str)
            .collect();

        sqlx::query(
            r#"
            UPDATE checkouts
            SET status = $2
            WHERE provider_order_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(&order.provider_order_id)
        .bind(CheckoutStatus::Confirmed.as_str())
        .bind(&sources)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to confirm checkout", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(
            commission_id = %commission.commission_id,
            affiliate_id = %commission.affiliate_id,
            "Order and commission recorded"
        );

        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE order_id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get order", e))?;

        timer.observe_duration();
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_commission_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Commission>, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_commission"])
            .start_timer();

        let commission = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {} FROM commissions WHERE order_id = $1",
            COMMISSION_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get commission", e))?;

        timer.observe_duration();
        Ok(commission)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn mark_order_refunded(&self, order_id: Uuid) -> Result<bool, CommissionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_order_refunded"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'refunded'
            WHERE order_id = $1 AND status = 'confirmed'
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark order refunded", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}
