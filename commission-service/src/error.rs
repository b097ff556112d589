//! Error taxonomy of the commission service and its HTTP mapping.

use serde_json::json;
use service_core::error::AppError;
use thiserror::Error;

use crate::pricing::{floor_dp, fraction_to_percent, round_percent_1dp, PricingError};
use crate::services::provider::ProviderError;

/// Why a webhook (or the order it refers to) could not be trusted.
#[derive(Debug, Error)]
pub enum PaymentVerificationError {
    #[error("missing webhook signature headers")]
    MissingSignature,

    #[error("webhook signature does not match")]
    InvalidSignature,

    #[error("webhook timestamp outside the accepted window")]
    StaleTimestamp,

    #[error("provider order lookup failed: {0}")]
    LookupFailed(#[source] ProviderError),

    #[error("provider reports order {provider_order_id} in state '{state}', not completed")]
    NotCaptured {
        provider_order_id: String,
        state: String,
    },

    #[error(
        "provider amount {actual_minor} {actual_currency} does not match checkout amount \
         {expected_minor} {expected_currency}"
    )]
    AmountMismatch {
        expected_minor: i64,
        expected_currency: String,
        actual_minor: i64,
        actual_currency: String,
    },
}

#[derive(Debug, Error)]
pub enum CommissionError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("payment verification failed: {0}")]
    PaymentVerification(#[from] PaymentVerificationError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The record exists but is not in a state that allows the change.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// An order already exists for this provider order id.
    #[error("order for provider order {0} already recorded")]
    DuplicateOrder(String),

    /// Captured payment with no checkout snapshot to attribute it to.
    #[error("no checkout found for captured provider order {0}")]
    OrphanPayment(String),

    /// Persisting order/commission failed after the customer was charged.
    #[error("failed to record order and commission: {0}")]
    Recording(#[source] anyhow::Error),

    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("storage error: {0}")]
    Store(#[source] anyhow::Error),
}

impl CommissionError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CommissionError::NotFound(what.into())
    }

    /// Errors meaning a customer may have been charged without a recorded
    /// commission. These must page someone.
    pub fn requires_alert(&self) -> bool {
        matches!(
            self,
            CommissionError::Recording(_)
                | CommissionError::OrphanPayment(_)
                | CommissionError::PaymentVerification(
                    PaymentVerificationError::AmountMismatch { .. }
                )
        )
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        let message = err.to_string();
        match err {
            PricingError::InvalidInput(_) => AppError::unprocessable("INVALID_INPUT", message),
            PricingError::MarginExceedsPublicPrice {
                requested_rate,
                max_allowed_rate,
                max_allowed_selling_price,
            } => AppError::Unprocessable {
                code: "MARGIN_EXCEEDS_PUBLIC_PRICE",
                message,
                details: Some(json!({
                    "requested_rate": round_percent_1dp(fraction_to_percent(requested_rate)),
                    // Floored so the reported value itself is always saveable.
                    "max_allowed_rate": floor_dp(fraction_to_percent(max_allowed_rate), 1),
                    "max_allowed_selling_price": floor_dp(max_allowed_selling_price, 2),
                })),
            },
            PricingError::NonSellableItem { max_rate, min_rate } => AppError::Unprocessable {
                code: "NON_SELLABLE_ITEM",
                message,
                details: Some(json!({
                    "max_rate": round_percent_1dp(fraction_to_percent(max_rate)),
                    "min_rate": round_percent_1dp(fraction_to_percent(min_rate)),
                })),
            },
        }
    }
}

impl From<CommissionError> for AppError {
    fn from(err: CommissionError) -> Self {
        match err {
            CommissionError::Pricing(e) => e.into(),
            CommissionError::PaymentVerification(e) => match e {
                PaymentVerificationError::MissingSignature
                | PaymentVerificationError::InvalidSignature
                | PaymentVerificationError::StaleTimestamp => {
                    AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
                }
                PaymentVerificationError::LookupFailed(_) => AppError::BadGateway(e.to_string()),
                PaymentVerificationError::NotCaptured { .. }
                | PaymentVerificationError::AmountMismatch { .. } => {
                    AppError::Conflict(anyhow::anyhow!(e.to_string()))
                }
            },
            CommissionError::NotFound(what) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", what))
            }
            CommissionError::InvalidRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            CommissionError::InvalidTransition(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            CommissionError::DuplicateOrder(id) => AppError::Conflict(anyhow::anyhow!(
                "order for provider order {} already recorded",
                id
            )),
            CommissionError::Provider(ProviderError::NotConfigured) => AppError::ServiceUnavailable,
            CommissionError::Provider(e) => AppError::BadGateway(e.to_string()),
            CommissionError::OrphanPayment(_) | CommissionError::Recording(_) => {
                AppError::InternalError(anyhow::anyhow!(err.to_string()))
            }
            CommissionError::Store(e) => AppError::DatabaseError(e),
        }
    }
}
