//! Payment provider (merchant orders API) client.
//!
//! Creates provider orders at checkout, re-fetches them when a webhook
//! arrives, and verifies webhook signatures.

use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::retry::{retry_async, RetryConfig};
use service_core::utils::signature::verify_hmac_sha256_hex;
use std::fmt;
use std::time::Instant;
use thiserror::Error;

use crate::config::PaymentProviderConfig;
use crate::error::PaymentVerificationError;
use crate::services::metrics::PROVIDER_REQUEST_DURATION;

pub const SIGNATURE_HEADER: &str = "Revolut-Signature";
pub const TIMESTAMP_HEADER: &str = "Revolut-Request-Timestamp";
const SIGNATURE_VERSION: &str = "v1";
/// Accepted distance between the signed timestamp and now.
const SIGNATURE_TOLERANCE_MS: i64 = 5 * 60 * 1000;

const MERCHANT_REF_PREFIX: &str = "LINKME";
const MERCHANT_REF_SUFFIX_LEN: usize = 9;
const MERCHANT_REF_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("payment provider credentials not configured")]
    NotConfigured,

    #[error("payment provider request timed out")]
    Timeout,

    #[error("payment provider unreachable: {0}")]
    Transport(String),

    #[error("payment provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected payment provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Failures worth retrying: the provider may succeed on a second try.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => *status >= 500 || *status == 429,
            ProviderError::NotConfigured | ProviderError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Provider-side order state. Unknown states are kept as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOrderState {
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "PROCESSING")]
    Processing,
    #[serde(alias = "AUTHORISED")]
    Authorised,
    #[serde(alias = "COMPLETED")]
    Completed,
    #[serde(alias = "CANCELLED")]
    Cancelled,
    #[serde(alias = "FAILED")]
    Failed,
    #[serde(other)]
    Other,
}

impl ProviderOrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Authorised => "authorised",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProviderOrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct CreateProviderOrder {
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    pub merchant_order_ext_ref: String,
    pub customer_email: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    /// Public token for the provider's checkout widget.
    #[serde(default)]
    pub token: Option<String>,
    pub state: ProviderOrderState,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub merchant_order_ext_ref: Option<String>,
}

#[derive(Clone)]
pub struct PaymentProviderClient {
    client: Client,
    config: PaymentProviderConfig,
    retry: RetryConfig,
}

impl PaymentProviderClient {
    pub fn new(config: PaymentProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let retry = RetryConfig {
            max_retries: config.max_retries,
            ..RetryConfig::single_quick_retry()
        };
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.expose_secret().is_empty()
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    pub fn signatures_required(&self) -> bool {
        self.config.webhook_secret().is_some()
    }

    /// Create a provider order. Not retried: a second POST could create a
    /// second order.
    pub async fn create_order(
        &self,
        request: &CreateProviderOrder,
    ) -> Result<ProviderOrder, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured);
        }

        let url = format!("{}/orders", self.config.api_base_url);
        let started = Instant::now();
        let result = self
            .send(
                self.client
                    .post(&url)
                    .bearer_auth(self.config.api_key.expose_secret())
                    .json(request),
            )
            .await;
        observe("create_order", started, &result);

        let order = result?;
        tracing::info!(
            provider_order_id = %order.id,
            merchant_order_ref = %request.merchant_order_ext_ref,
            amount = order.amount,
            currency = %order.currency,
            "Provider order created"
        );
        Ok(order)
    }

    /// Fetch the authoritative state of an order, retrying transient
    /// failures.
    pub async fn get_order(&self, provider_order_id: &str) -> Result<ProviderOrder, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured);
        }

        let url = format!("{}/orders/{}", self.config.api_base_url, provider_order_id);
        let url = url.as_str();
        retry_async(
            &self.retry,
            "provider_get_order",
            || async move {
                let started = Instant::now();
                let result = self
                    .send(
                        self.client
                            .get(url)
                            .bearer_auth(self.config.api_key.expose_secret()),
                    )
                    .await;
                observe("get_order", started, &result);
                result
            },
            ProviderError::is_transient,
        )
        .await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ProviderOrder, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Payment provider response");

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
        } else {
            tracing::warn!(status = %status, body = %body, "Payment provider request failed");
            Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Check a webhook's signature headers against the raw body.
    ///
    /// A no-op when no webhook secret is configured. The header may carry
    /// several comma-separated `v1=<hex>` signatures during secret rotation;
    /// any match is accepted.
    pub fn verify_webhook_signature(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
        timestamp_header: Option<&str>,
        now_millis: i64,
    ) -> Result<(), PaymentVerificationError> {
        let Some(secret) = self.config.webhook_secret() else {
            return Ok(());
        };
        verify_signature(secret, body, signature_header, timestamp_header, now_millis)
    }
}

fn observe(operation: &str, started: Instant, result: &Result<ProviderOrder, ProviderError>) {
    let status = match result {
        Ok(_) => "ok".to_string(),
        Err(ProviderError::Status { status, .. }) => status.to_string(),
        Err(ProviderError::Timeout) => "timeout".to_string(),
        Err(_) => "error".to_string(),
    };
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[operation, &status])
        .observe(started.elapsed().as_secs_f64());
}

pub(crate) fn verify_signature(
    secret: &str,
    body: &[u8],
    signature_header: Option<&str>,
    timestamp_header: Option<&str>,
    now_millis: i64,
) -> Result<(), PaymentVerificationError> {
    let (Some(signatures), Some(timestamp)) = (signature_header, timestamp_header) else {
        return Err(PaymentVerificationError::MissingSignature);
    };

    let timestamp = timestamp.trim();
    let sent_at: i64 = timestamp
        .parse()
        .map_err(|_| PaymentVerificationError::InvalidSignature)?;
    if (now_millis - sent_at).abs() > SIGNATURE_TOLERANCE_MS {
        return Err(PaymentVerificationError::StaleTimestamp);
    }

    let mut payload = format!("{}.{}.", SIGNATURE_VERSION, timestamp).into_bytes();
    payload.extend_from_slice(body);

    let prefix = format!("{}=", SIGNATURE_VERSION);
    for candidate in signatures.split(',') {
        let Some(hex) = candidate.trim().strip_prefix(&prefix) else {
            continue;
        };
        match verify_hmac_sha256_hex(secret, &payload, hex) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "Webhook signature computation failed");
                return Err(PaymentVerificationError::InvalidSignature);
            }
        }
    }

    Err(PaymentVerificationError::InvalidSignature)
}

/// `LINKME-{unix_millis}-{9 uppercase alphanumerics}`.
pub fn generate_merchant_ref() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..MERCHANT_REF_SUFFIX_LEN)
        .map(|_| MERCHANT_REF_CHARSET[rng.gen_range(0..MERCHANT_REF_CHARSET.len())] as char)
        .collect();
    format!(
        "{}-{}-{}",
        MERCHANT_REF_PREFIX,
        Utc::now().timestamp_millis(),
        suffix
    )
}
