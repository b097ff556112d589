//! Configuration module for commission-service.

use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, env_or};
use service_core::error::AppError;
use std::env;
use std::time::Duration;

use crate::pricing::PricingSettings;

#[derive(Debug, Clone)]
pub struct CommissionConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
    pub payment: PaymentProviderConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Pricing tunables, all decimal fractions.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub buffer_rate: f64,
    pub min_margin_rate: f64,
    pub vat_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            buffer_rate: 0.05,
            min_margin_rate: 0.01,
            vat_rate: 0.20,
        }
    }
}

impl PricingConfig {
    pub fn settings(&self) -> Result<PricingSettings, AppError> {
        PricingSettings::new(self.buffer_rate, self.min_margin_rate)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid pricing settings: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct PaymentProviderConfig {
    pub api_base_url: String,
    /// Empty disables checkout creation and order lookups.
    pub api_key: Secret<String>,
    /// When set, webhook signatures are mandatory.
    pub webhook_secret: Option<Secret<String>>,
    pub currency: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for PaymentProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://sandbox-merchant.revolut.com/api/1.0".to_string(),
            api_key: Secret::new(String::new()),
            webhook_secret: None,
            currency: "EUR".to_string(),
            timeout: Duration::from_millis(10_000),
            max_retries: 1,
        }
    }
}

impl PaymentProviderConfig {
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.is_empty())
    }
}

impl CommissionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let pricing = PricingConfig {
            buffer_rate: env_or("PRICING_BUFFER_RATE", 0.05)?,
            min_margin_rate: env_or("PRICING_MIN_MARGIN_RATE", 0.01)?,
            vat_rate: env_or("PRICING_VAT_RATE", 0.20)?,
        };
        pricing.settings()?;
        if !(0.0..1.0).contains(&pricing.vat_rate) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PRICING_VAT_RATE must be in [0, 1), got {}",
                pricing.vat_rate
            )));
        }

        let defaults = PaymentProviderConfig::default();
        let payment = PaymentProviderConfig {
            api_base_url: env::var("PAYMENT_API_BASE_URL")
                .unwrap_or(defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: Secret::new(env::var("PAYMENT_API_KEY").unwrap_or_default()),
            webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET").ok().map(Secret::new),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            timeout: Duration::from_millis(env_or("PAYMENT_TIMEOUT_MS", 10_000u64)?),
            max_retries: env_or("PAYMENT_MAX_RETRIES", 1u32)?,
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "commission-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 2)?,
            },
            pricing,
            payment,
        })
    }
}
