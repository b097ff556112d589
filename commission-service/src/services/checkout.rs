//! Order intake: freeze a cart at server-computed prices and open a
//! provider order for it.

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::dtos::checkout::CheckoutRequest;
use crate::error::CommissionError;
use crate::models::{to_minor_units, to_money, CatalogItem, CheckoutLine, CheckoutStatus, PendingCheckout};
use crate::pricing::{compose_final_price, compute_margin_zones, validate_margin, PricingSettings};
use crate::services::metrics::CHECKOUTS_TOTAL;
use crate::services::provider::{generate_merchant_ref, CreateProviderOrder, PaymentProviderClient};
use crate::services::store::CommerceStore;

fn overflow(what: String) -> CommissionError {
    CommissionError::InvalidRequest(format!("{} exceeds the supported amount range", what))
}

#[derive(Debug, Clone)]
pub struct CheckoutCreated {
    pub checkout: PendingCheckout,
    pub checkout_token: Option<String>,
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn CommerceStore>,
    provider: PaymentProviderClient,
    settings: PricingSettings,
    vat_rate: f64,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        provider: PaymentProviderClient,
        settings: PricingSettings,
        vat_rate: f64,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
            vat_rate,
        }
    }

    /// Unit price excluding tax, recomputed from the stored item.
    fn unit_price(&self, item: &CatalogItem, platform_rate: f64) -> Result<Decimal, CommissionError> {
        let margin = item.margin_fraction();
        let price = match item.public_price_excl_tax {
            Some(public_price) => {
                compute_margin_zones(
                    item.base_price_excl_tax,
                    public_price,
                    platform_rate,
                    &self.settings,
                )?
                .ensure_sellable()?;
                validate_margin(
                    item.base_price_excl_tax,
                    public_price,
                    platform_rate,
                    margin,
                    &self.settings,
                )?
            }
            None => compose_final_price(item.base_price_excl_tax, platform_rate, margin)?,
        };
        to_money(price.final_customer_price).ok_or_else(|| {
            CommissionError::InvalidRequest(format!(
                "item {} has an unrepresentable price {}",
                item.item_id, price.final_customer_price
            ))
        })
    }

    /// Expects a request that already passed `validator` checks.
    #[instrument(
        skip(self, request),
        fields(affiliate_id = %request.affiliate_id, selection_id = %request.selection_id, lines = request.lines.len())
    )]
    pub async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutCreated, CommissionError> {
        let affiliate = self
            .store
            .get_affiliate(request.affiliate_id)
            .await?
            .ok_or_else(|| {
                CommissionError::not_found(format!("affiliate {}", request.affiliate_id))
            })?;
        let platform_rate = affiliate.platform_fee_fraction();

        let mut item_ids: Vec<Uuid> = request.lines.iter().map(|l| l.item_id).collect();
        item_ids.sort_unstable();
        item_ids.dedup();
        let items: HashMap<Uuid, CatalogItem> = self
            .store
            .get_catalog_items(&item_ids)
            .await?
            .into_iter()
            .map(|item| (item.item_id, item))
            .collect();

        let mut lines = Vec::with_capacity(request.lines.len());
        for requested in &request.lines {
            let item = items.get(&requested.item_id).ok_or_else(|| {
                CommissionError::not_found(format!("catalog item {}", requested.item_id))
            })?;
            if item.selection_id != request.selection_id || item.affiliate_id != affiliate.affiliate_id
            {
                return Err(CommissionError::InvalidRequest(format!(
                    "item {} does not belong to selection {}",
                    item.item_id, request.selection_id
                )));
            }

            let unit_price = self.unit_price(item, platform_rate)?;
            let line_total = unit_price
                .checked_mul(Decimal::from(requested.quantity))
                .ok_or_else(|| overflow(format!("line total of item {}", item.item_id)))?;
            lines.push(CheckoutLine {
                selection_item_id: item.item_id,
                product_id: item.product_id,
                quantity: requested.quantity,
                unit_price_excl_tax: unit_price,
                line_total_excl_tax: line_total,
            });
        }

        let vat_rate = Decimal::from_f64(self.vat_rate)
            .ok_or_else(|| CommissionError::InvalidRequest("invalid VAT rate".to_string()))?
            .round_dp(6);
        let total_excl_tax = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.line_total_excl_tax))
            .ok_or_else(|| overflow("order total".to_string()))?;
        let total_vat = total_excl_tax
            .checked_mul(vat_rate)
            .ok_or_else(|| overflow("VAT".to_string()))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let total_incl_tax = total_excl_tax
            .checked_add(total_vat)
            .ok_or_else(|| overflow("order total".to_string()))?;
        let amount_minor = to_minor_units(total_incl_tax).ok_or_else(|| {
            CommissionError::InvalidRequest(format!("unrepresentable total {}", total_incl_tax))
        })?;

        let merchant_order_ref = generate_merchant_ref();
        let provider_order = self
            .provider
            .create_order(&CreateProviderOrder {
                amount: amount_minor,
                currency: self.provider.currency().to_string(),
                merchant_order_ext_ref: merchant_order_ref.clone(),
                customer_email: request.customer_email.clone(),
                description: format!("Selection {}", request.selection_id),
            })
            .await
            .inspect_err(|_| {
                CHECKOUTS_TOTAL.with_label_values(&["provider_error"]).inc();
            })?;

        let checkout = PendingCheckout {
            checkout_id: Uuid::new_v4(),
            merchant_order_ref,
            provider_order_id: provider_order.id.clone(),
            affiliate_id: affiliate.affiliate_id,
            selection_id: request.selection_id,
            customer_email: request.customer_email.clone(),
            lines: Json(lines),
            total_excl_tax,
            total_vat,
            total_incl_tax,
            amount_minor: amount_minor as i64,
            currency: self.provider.currency().to_string(),
            status: CheckoutStatus::Pending,
            created_utc: Utc::now(),
        };

        if let Err(e) = self.store.insert_checkout(&checkout).await {
            // Nothing is charged yet; the provider order simply expires.
            error!(
                provider_order_id = %checkout.provider_order_id,
                error = %e,
                "Failed to persist checkout after provider order creation"
            );
            CHECKOUTS_TOTAL.with_label_values(&["store_error"]).inc();
            return Err(e);
        }

        CHECKOUTS_TOTAL.with_label_values(&["created"]).inc();
        info!(
            checkout_id = %checkout.checkout_id,
            provider_order_id = %checkout.provider_order_id,
            merchant_order_ref = %checkout.merchant_order_ref,
            amount_minor = checkout.amount_minor,
            "Checkout created"
        );

        Ok(CheckoutCreated {
            checkout,
            checkout_token: provider_order.token,
        })
    }
}
