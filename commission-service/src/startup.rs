//! Application startup and lifecycle management.

use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{CommissionConfig, PricingConfig};
use crate::handlers;
use crate::services::{
    init_metrics, CheckoutService, CommerceStore, PaymentProviderClient, PgStore,
    SelectionService, WebhookService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CommerceStore>,
    pub selection: SelectionService,
    pub checkout: CheckoutService,
    pub webhooks: WebhookService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        provider: PaymentProviderClient,
        pricing: &PricingConfig,
    ) -> Result<Self, AppError> {
        let settings = pricing.settings()?;
        Ok(Self {
            selection: SelectionService::new(store.clone(), settings.clone()),
            checkout: CheckoutService::new(
                store.clone(),
                provider.clone(),
                settings,
                pricing.vat_rate,
            ),
            webhooks: WebhookService::new(store.clone(), provider),
            store,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/items/:id/margin-zones",
            get(handlers::items::get_margin_zones),
        )
        .route("/items/:id/margin", put(handlers::items::save_margin))
        .route("/checkout", post(handlers::checkout::create_checkout))
        .route(
            "/webhooks/payments",
            post(handlers::webhooks::payment_webhook),
        )
        .route("/orders/:id/refund", post(handlers::orders::refund_order))
        .route(
            "/orders/:id/commission",
            get(handlers::orders::get_commission),
        )
        .route_layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Bind the configured `host:port`. Hostnames are resolved.
pub async fn bind_listener(config: &core_config::Config) -> Result<TcpListener, AppError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
        AppError::from(e)
    })
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: CommissionConfig) -> Result<Self, AppError> {
        init_metrics();

        let store = PgStore::connect(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            AppError::from(e)
        })?;
        store.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            AppError::from(e)
        })?;

        let provider = PaymentProviderClient::new(config.payment.clone()).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
        })?;
        if provider.is_configured() {
            tracing::info!(
                base_url = %config.payment.api_base_url,
                signatures_required = provider.signatures_required(),
                "Payment provider client initialized"
            );
        } else {
            tracing::warn!(
                "Payment provider credentials not configured - checkout and confirmation disabled"
            );
        }

        let state = AppState::new(Arc::new(store), provider, &config.pricing)?;
        let router = build_router(state);

        let listener = bind_listener(&config.common).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(port = self.port, "Commission service listening");
        axum::serve(self.listener, self.router).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_configured_host() {
        let config = core_config::Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let listener = bind_listener(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn unresolvable_host_is_an_error() {
        let config = core_config::Config {
            host: "no such host".to_string(),
            port: 0,
        };
        assert!(bind_listener(&config).await.is_err());
    }
}
