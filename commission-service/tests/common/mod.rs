#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use commission_service::config::{PaymentProviderConfig, PricingConfig};
use commission_service::models::{Affiliate, CatalogItem};
use commission_service::services::{InMemoryStore, PaymentProviderClient};
use commission_service::{build_router, AppState};
use http_body_util::BodyExt;
use secrecy::Secret;
use service_core::retry::RetryConfig;
use service_core::utils::signature::hmac_sha256_hex;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WEBHOOK_SECRET: &str = "wsk_test_secret";
pub const PROVIDER_ORDER_ID: &str = "ord_test_123";

/// Affiliate rates of record: 10% default margin, 5% platform commission.
pub const DEFAULT_MARGIN_RATE: f64 = 10.0;
pub const PLATFORM_RATE: f64 = 5.0;
/// Margin stored on the seeded item, deliberately different from the
/// affiliate default.
pub const ITEM_MARGIN_RATE: f64 = 20.0;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub provider: MockServer,
    pub affiliate_id: Uuid,
    pub selection_id: Uuid,
    /// base 100, public 150
    pub item_id: Uuid,
    /// base 100, public 103: never sellable
    pub unsellable_item_id: Uuid,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_secret(Some(WEBHOOK_SECRET)).await
    }

    pub async fn spawn_with_secret(webhook_secret: Option<&str>) -> Self {
        let provider = MockServer::start().await;
        let store = Arc::new(InMemoryStore::new());

        let affiliate_id = Uuid::new_v4();
        let selection_id = Uuid::new_v4();
        store
            .insert_affiliate(Affiliate {
                affiliate_id,
                display_name: "Maison Test".to_string(),
                default_margin_rate: DEFAULT_MARGIN_RATE,
                max_margin_rate: 50.0,
                platform_commission_rate: PLATFORM_RATE,
                created_utc: Utc::now(),
            })
            .unwrap();

        let item_id = Uuid::new_v4();
        let unsellable_item_id = Uuid::new_v4();
        for (id, public) in [(item_id, 150.0), (unsellable_item_id, 103.0)] {
            store
                .insert_item(CatalogItem {
                    item_id: id,
                    selection_id,
                    affiliate_id,
                    product_id: Uuid::new_v4(),
                    base_price_excl_tax: 100.0,
                    margin_rate: ITEM_MARGIN_RATE,
                    public_price_excl_tax: Some(public),
                    updated_utc: Utc::now(),
                })
                .unwrap();
        }

        let client = PaymentProviderClient::new(PaymentProviderConfig {
            api_base_url: provider.uri(),
            api_key: Secret::new("sk_test".to_string()),
            webhook_secret: webhook_secret.map(|s| Secret::new(s.to_string())),
            currency: "EUR".to_string(),
            timeout: Duration::from_secs(2),
            max_retries: 1,
        })
        .unwrap()
        .with_retry(RetryConfig {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            add_jitter: false,
        });

        let state = AppState::new(store.clone(), client, &PricingConfig::default()).unwrap();

        Self {
            router: build_router(state),
            store,
            provider,
            affiliate_id,
            selection_id,
            item_id,
            unsellable_item_id,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Provider accepts order creation for `amount_minor`.
    pub async fn mock_create_order(&self, amount_minor: i64) {
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("authorization", "Bearer sk_test"))
            .respond_with(ResponseTemplate::new(201).set_body_json(provider_order(
                "pending",
                amount_minor,
            )))
            .mount(&self.provider)
            .await;
    }

    /// Provider reports the order in `state` for `amount_minor`.
    pub async fn mock_get_order(&self, state: &str, amount_minor: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/orders/{}", PROVIDER_ORDER_ID)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(provider_order(state, amount_minor)),
            )
            .mount(&self.provider)
            .await;
    }

    /// Check out `quantity` units of the sellable item. 125.00 per unit
    /// (100 × (1 + 5% + 20%)), plus 20% VAT.
    pub async fn checkout(&self, quantity: u32) -> serde_json::Value {
        let (status, body) = self
            .send_json(
                "POST",
                "/checkout",
                serde_json::json!({
                    "affiliate_id": self.affiliate_id,
                    "selection_id": self.selection_id,
                    "customer_email": "buyer@example.com",
                    "lines": [{ "item_id": self.item_id, "quantity": quantity }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "checkout failed: {body}");
        body
    }

    pub async fn webhook(&self, event: &str) -> (StatusCode, serde_json::Value) {
        let body = webhook_body(event);
        self.request(signed_webhook(&body, Utc::now().timestamp_millis()))
            .await
    }
}

pub fn provider_order(state: &str, amount_minor: i64) -> serde_json::Value {
    serde_json::json!({
        "id": PROVIDER_ORDER_ID,
        "token": "tok_public_123",
        "state": state,
        "amount": amount_minor,
        "currency": "EUR",
    })
}

pub fn webhook_body(event: &str) -> String {
    serde_json::json!({
        "event": event,
        "order_id": PROVIDER_ORDER_ID,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}

pub fn sign(body: &str, timestamp: i64) -> String {
    let payload = format!("v1.{}.{}", timestamp, body);
    format!(
        "v1={}",
        hmac_sha256_hex(WEBHOOK_SECRET, payload.as_bytes()).unwrap()
    )
}

pub fn signed_webhook(body: &str, timestamp: i64) -> Request<Body> {
    Request::post("/webhooks/payments")
        .header("content-type", "application/json")
        .header("Revolut-Signature", sign(body, timestamp))
        .header("Revolut-Request-Timestamp", timestamp.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}
