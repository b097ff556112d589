//! Payment webhook processing.
//!
//! Deliveries arrive at least once and in any order. A confirmed payment is
//! turned into exactly one order and one commission; the store's unique
//! constraints are the idempotency boundary.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::dtos::webhooks::WebhookEnvelope;
use crate::error::{CommissionError, PaymentVerificationError};
use crate::models::{
    money_to_f64, to_money, CheckoutStatus, Commission, CommissionStatus, Order, OrderLine,
    OrderStatus, PendingCheckout,
};
use crate::pricing::split_commission;
use crate::services::metrics::{
    COMMISSIONS_CREATED_TOTAL, RECORDING_FAILURES_TOTAL, WEBHOOK_EVENTS_TOTAL,
};
use crate::services::provider::{PaymentProviderClient, ProviderOrderState};
use crate::services::store::CommerceStore;

/// Provider event types this service acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    OrderCompleted,
    OrderAuthorised,
    OrderPaymentFailed,
    OrderCancelled,
    Unknown(String),
}

impl PaymentEvent {
    pub fn parse(event: &str) -> Self {
        match event.trim().to_ascii_uppercase().as_str() {
            "ORDER_COMPLETED" => Self::OrderCompleted,
            "ORDER_AUTHORISED" => Self::OrderAuthorised,
            "ORDER_PAYMENT_FAILED" => Self::OrderPaymentFailed,
            "ORDER_CANCELLED" => Self::OrderCancelled,
            _ => Self::Unknown(event.to_string()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::OrderCompleted => "order_completed",
            Self::OrderAuthorised => "order_authorised",
            Self::OrderPaymentFailed => "order_payment_failed",
            Self::OrderCancelled => "order_cancelled",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Checkout status a non-completion event moves to.
    fn checkout_target(&self) -> Option<CheckoutStatus> {
        match self {
            Self::OrderAuthorised => Some(CheckoutStatus::Authorised),
            Self::OrderPaymentFailed => Some(CheckoutStatus::Failed),
            Self::OrderCancelled => Some(CheckoutStatus::Cancelled),
            Self::OrderCompleted | Self::Unknown(_) => None,
        }
    }
}

/// What a webhook delivery resulted in. Every variant is acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// First confirmation: order and commission written.
    CommissionRecorded { order_id: Uuid, commission_id: Uuid },
    /// Redelivery of an already recorded confirmation.
    Duplicate { provider_order_id: String },
    /// Checkout moved to a new non-confirmed status.
    StatusUpdated { status: CheckoutStatus },
    /// Late or out-of-order event that would regress the checkout.
    NoChange,
    /// Event type this service does not handle.
    Ignored { event: String },
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CommissionRecorded { .. } => "commission_recorded",
            Self::Duplicate { .. } => "duplicate",
            Self::StatusUpdated { .. } => "status_updated",
            Self::NoChange => "no_change",
            Self::Ignored { .. } => "ignored",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundAction {
    Retained,
    Voided,
}

impl RefundAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retained => "retained",
            Self::Voided => "voided",
        }
    }
}

/// Decides what happens to a commission when its order is refunded.
#[async_trait]
pub trait RefundPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_refund(
        &self,
        order: &Order,
        commission: Option<&Commission>,
    ) -> Result<RefundAction, CommissionError>;
}

/// Keep the commission untouched; settlement decides later.
#[derive(Debug, Default)]
pub struct RetainCommission;

#[async_trait]
impl RefundPolicy for RetainCommission {
    fn name(&self) -> &'static str {
        "retain_commission"
    }

    async fn on_refund(
        &self,
        order: &Order,
        commission: Option<&Commission>,
    ) -> Result<RefundAction, CommissionError> {
        info!(
            order_id = %order.order_id,
            commission_id = ?commission.map(|c| c.commission_id),
            "Order refunded, commission retained"
        );
        Ok(RefundAction::Retained)
    }
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub order: Order,
    pub action: RefundAction,
}

#[derive(Clone)]
pub struct WebhookService {
    store: Arc<dyn CommerceStore>,
    provider: PaymentProviderClient,
    refund_policy: Arc<dyn RefundPolicy>,
}

impl WebhookService {
    pub fn new(store: Arc<dyn CommerceStore>, provider: PaymentProviderClient) -> Self {
        Self {
            store,
            provider,
            refund_policy: Arc::new(RetainCommission),
        }
    }

    pub fn with_refund_policy(mut self, policy: Arc<dyn RefundPolicy>) -> Self {
        self.refund_policy = policy;
        self
    }

    /// Check signature headers against the raw body.
    pub fn verify_signature(
        &self,
        body: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<(), CommissionError> {
        self.provider
            .verify_webhook_signature(body, signature, timestamp, Utc::now().timestamp_millis())
            .inspect_err(|e| {
                warn!(error = %e, "Webhook signature rejected");
                WEBHOOK_EVENTS_TOTAL
                    .with_label_values(&["unverified", "rejected"])
                    .inc();
            })
            .map_err(CommissionError::from)
    }

    #[instrument(skip(self, envelope), fields(event = %envelope.event, provider_order_id = %envelope.order_id))]
    pub async fn handle(&self, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, CommissionError> {
        let event = PaymentEvent::parse(&envelope.event);

        let result = match &event {
            PaymentEvent::OrderCompleted => self.on_payment_confirmed(&envelope.order_id).await,
            PaymentEvent::Unknown(name) => {
                info!(event = %name, "Ignoring unhandled webhook event");
                Ok(WebhookOutcome::Ignored {
                    event: name.clone(),
                })
            }
            other => match other.checkout_target() {
                Some(target) => self.update_status(&envelope.order_id, target).await,
                None => Ok(WebhookOutcome::NoChange),
            },
        };

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        WEBHOOK_EVENTS_TOTAL
            .with_label_values(&[event.label(), outcome])
            .inc();

        result
    }

    async fn update_status(
        &self,
        provider_order_id: &str,
        target: CheckoutStatus,
    ) -> Result<WebhookOutcome, CommissionError> {
        if self
            .store
            .transition_checkout(provider_order_id, target)
            .await?
        {
            info!(status = %target, "Checkout status updated");
            Ok(WebhookOutcome::StatusUpdated { status: target })
        } else {
            info!(status = %target, "Checkout unknown or already past this status");
            Ok(WebhookOutcome::NoChange)
        }
    }

    /// Turn a completed provider order into an order and its commission.
    #[instrument(skip(self))]
    pub async fn on_payment_confirmed(
        &self,
        provider_order_id: &str,
    ) -> Result<WebhookOutcome, CommissionError> {
        let result = self.confirm(provider_order_id).await;
        if let Err(e) = &result {
            if e.requires_alert() {
                let reason = match e {
                    CommissionError::OrphanPayment(_) => "orphan_payment",
                    CommissionError::PaymentVerification(_) => "amount_mismatch",
                    _ => "persistence",
                };
                RECORDING_FAILURES_TOTAL.with_label_values(&[reason]).inc();
                error!(
                    alert = true,
                    provider_order_id = %provider_order_id,
                    reason = reason,
                    error = %e,
                    "Captured payment without recorded commission"
                );
            }
        }
        result
    }

    async fn confirm(&self, provider_order_id: &str) -> Result<WebhookOutcome, CommissionError> {
        let checkout = self
            .store
            .get_checkout_by_provider_order(provider_order_id)
            .await
            .map_err(|e| CommissionError::Recording(anyhow::anyhow!(e)))?;

        if let Some(checkout) = &checkout {
            if checkout.status == CheckoutStatus::Confirmed {
                info!("Payment already recorded");
                return Ok(WebhookOutcome::Duplicate {
                    provider_order_id: provider_order_id.to_string(),
                });
            }
        }

        let provider_order = self
            .provider
            .get_order(provider_order_id)
            .await
            .map_err(PaymentVerificationError::LookupFailed)?;

        if provider_order.state != ProviderOrderState::Completed {
            return Err(PaymentVerificationError::NotCaptured {
                provider_order_id: provider_order_id.to_string(),
                state: provider_order.state.to_string(),
            }
            .into());
        }

        let checkout =
            checkout.ok_or_else(|| CommissionError::OrphanPayment(provider_order_id.to_string()))?;

        if provider_order.amount != checkout.amount_minor
            || !provider_order
                .currency
                .eq_ignore_ascii_case(&checkout.currency)
        {
            return Err(PaymentVerificationError::AmountMismatch {
                expected_minor: checkout.amount_minor,
                expected_currency: checkout.currency.clone(),
                actual_minor: provider_order.amount,
                actual_currency: provider_order.currency,
            }
            .into());
        }

        let (order, commission) = self
            .build_records(&checkout)
            .await
            .map_err(|e| CommissionError::Recording(anyhow::anyhow!(e)))?;

        match self.store.record_confirmed_order(&order, &commission).await {
            Ok(()) => {
                COMMISSIONS_CREATED_TOTAL.inc();
                info!(
                    order_id = %order.order_id,
                    commission_id = %commission.commission_id,
                    affiliate_commission = %commission.affiliate_commission,
                    platform_commission = %commission.platform_commission,
                    "Commission recorded"
                );
                Ok(WebhookOutcome::CommissionRecorded {
                    order_id: order.order_id,
                    commission_id: commission.commission_id,
                })
            }
            Err(CommissionError::DuplicateOrder(id)) => {
                info!(provider_order_id = %id, "Concurrent delivery already recorded the order");
                Ok(WebhookOutcome::Duplicate {
                    provider_order_id: id,
                })
            }
            Err(e) => Err(CommissionError::Recording(anyhow::anyhow!(e))),
        }
    }

    /// Commission amounts come from the affiliate's rates of record, not from
    /// the item margins the cart was priced with.
    async fn build_records(
        &self,
        checkout: &PendingCheckout,
    ) -> Result<(Order, Commission), CommissionError> {
        let affiliate = self
            .store
            .get_affiliate(checkout.affiliate_id)
            .await?
            .ok_or_else(|| {
                CommissionError::not_found(format!("affiliate {}", checkout.affiliate_id))
            })?;

        let split = split_commission(
            money_to_f64(checkout.total_excl_tax),
            affiliate.platform_fee_fraction(),
            affiliate.default_margin_fraction(),
        )?;

        let money = |amount: f64| {
            to_money(amount).ok_or_else(|| {
                CommissionError::InvalidRequest(format!("unrepresentable commission {}", amount))
            })
        };
        let affiliate_commission = money(split.affiliate_commission)?;
        let platform_commission = money(split.platform_commission)?;

        let now = Utc::now();
        let order = Order {
            order_id: Uuid::new_v4(),
            provider_order_id: checkout.provider_order_id.clone(),
            merchant_order_ref: checkout.merchant_order_ref.clone(),
            affiliate_id: checkout.affiliate_id,
            selection_id: checkout.selection_id,
            lines: Json(checkout.lines.iter().map(OrderLine::from).collect()),
            total_excl_tax: checkout.total_excl_tax,
            total_incl_tax: checkout.total_incl_tax,
            currency: checkout.currency.clone(),
            status: OrderStatus::Confirmed,
            confirmed_utc: now,
        };
        let commission = Commission {
            commission_id: Uuid::new_v4(),
            order_id: order.order_id,
            affiliate_id: affiliate.affiliate_id,
            order_amount_excl_tax: checkout.total_excl_tax,
            affiliate_commission,
            platform_commission,
            margin_rate_applied: affiliate.default_margin_rate,
            platform_rate_applied: affiliate.platform_commission_rate,
            status: CommissionStatus::Pending,
            created_utc: now,
        };
        Ok((order, commission))
    }

    /// `confirmed → refunded`, then hand the commission to the refund policy.
    #[instrument(skip(self), fields(order_id = %order_id, policy = self.refund_policy.name()))]
    pub async fn record_refund(&self, order_id: Uuid) -> Result<RefundOutcome, CommissionError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("order {}", order_id)))?;

        if !self.store.mark_order_refunded(order_id).await? {
            return Err(CommissionError::InvalidTransition(format!(
                "order {} is {}, only confirmed orders can be refunded",
                order_id,
                order.status.as_str()
            )));
        }

        let order = Order {
            status: OrderStatus::Refunded,
            ..order
        };
        let commission = self.store.get_commission_by_order(order_id).await?;
        let action = self
            .refund_policy
            .on_refund(&order, commission.as_ref())
            .await?;

        Ok(RefundOutcome { order, action })
    }

    pub async fn commission_for_order(&self, order_id: Uuid) -> Result<Commission, CommissionError> {
        self.store
            .get_commission_by_order(order_id)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("commission for order {}", order_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_names() {
        assert_eq!(PaymentEvent::parse("ORDER_COMPLETED"), PaymentEvent::OrderCompleted);
        assert_eq!(PaymentEvent::parse("order_authorised"), PaymentEvent::OrderAuthorised);
        assert_eq!(
            PaymentEvent::parse("ORDER_PAYMENT_FAILED").checkout_target(),
            Some(CheckoutStatus::Failed)
        );
        assert_eq!(
            PaymentEvent::parse("PAYOUT_INITIATED"),
            PaymentEvent::Unknown("PAYOUT_INITIATED".to_string())
        );
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(WebhookOutcome::NoChange.label(), "no_change");
        assert_eq!(
            WebhookOutcome::Duplicate {
                provider_order_id: "x".into()
            }
            .label(),
            "duplicate"
        );
    }
}
