mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use commission_service::models::CheckoutStatus;
use commission_service::services::CommerceStore;
use common::{signed_webhook, webhook_body, TestApp, PROVIDER_ORDER_ID};
use rust_decimal_macros::dec;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const AMOUNT_MINOR: i64 = 30_000;

/// Checkout two units (300.00 incl. VAT) and have the provider report the
/// order as captured.
async fn paid_checkout() -> TestApp {
    let app = TestApp::spawn().await;
    app.mock_create_order(AMOUNT_MINOR).await;
    app.checkout(2).await;
    app.mock_get_order("completed", AMOUNT_MINOR).await;
    app
}

async fn checkout_status(app: &TestApp) -> CheckoutStatus {
    app.store
        .get_checkout_by_provider_order(PROVIDER_ORDER_ID)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn completed_payment_records_commission_once() {
    let app = paid_checkout().await;

    let (status, body) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "commission_recorded");

    let (status, body) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "duplicate");

    assert_eq!(app.store.order_count(), 1);
    assert_eq!(app.store.commission_count(), 1);
    assert_eq!(checkout_status(&app).await, CheckoutStatus::Confirmed);
}

#[tokio::test]
async fn commission_uses_affiliate_rates_of_record() {
    let app = paid_checkout().await;
    app.webhook("ORDER_COMPLETED").await;

    // 250.00 excl. tax over (1 + 5% + 10%), not the item's 20% margin
    let commission = app.store.commissions().pop().unwrap();
    assert_eq!(commission.order_amount_excl_tax, dec!(250));
    assert_eq!(commission.affiliate_commission, dec!(21.74));
    assert_eq!(commission.platform_commission, dec!(10.87));
    assert_eq!(commission.margin_rate_applied, common::DEFAULT_MARGIN_RATE);
    assert_eq!(commission.platform_rate_applied, common::PLATFORM_RATE);

    let order = app.store.order_by_provider_order(PROVIDER_ORDER_ID).unwrap();
    let (status, body) = app
        .get(&format!("/orders/{}/commission", order.order_id))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order_id"], order.order_id.to_string());
    assert_eq!(body["status"], "pending");
    assert_eq!(
        body["affiliate_commission"]
            .as_str()
            .unwrap()
            .parse::<rust_decimal::Decimal>()
            .unwrap(),
        dec!(21.74)
    );
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_side_effects() {
    let app = paid_checkout().await;

    let body = webhook_body("ORDER_COMPLETED");
    let request = Request::post("/webhooks/payments")
        .header("content-type", "application/json")
        .header("Revolut-Signature", "v1=deadbeef")
        .header(
            "Revolut-Request-Timestamp",
            Utc::now().timestamp_millis().to_string(),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _) = app.request(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.commission_count(), 0);
}

#[tokio::test]
async fn missing_or_stale_signature_is_rejected() {
    let app = paid_checkout().await;
    let body = webhook_body("ORDER_COMPLETED");

    let unsigned = Request::post("/webhooks/payments")
        .header("content-type", "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _) = app.request(unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ten_minutes_ago = Utc::now().timestamp_millis() - 10 * 60 * 1000;
    let (status, _) = app.request(signed_webhook(&body, ten_minutes_ago)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.store.commission_count(), 0);
}

#[tokio::test]
async fn signatures_are_optional_without_secret() {
    let app = TestApp::spawn_with_secret(None).await;
    app.mock_create_order(AMOUNT_MINOR).await;
    app.checkout(2).await;
    app.mock_get_order("completed", AMOUNT_MINOR).await;

    let request = Request::post("/webhooks/payments")
        .header("content-type", "application/json")
        .body(Body::from(webhook_body("ORDER_COMPLETED")))
        .unwrap();
    let (status, body) = app.request(request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(app.store.commission_count(), 1);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let app = TestApp::spawn().await;

    let ts = Utc::now().timestamp_millis();
    let (status, _) = app.request(signed_webhook("{not json", ts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_event_is_acknowledged_and_ignored() {
    let app = paid_checkout().await;

    let (status, body) = app.webhook("PAYOUT_INITIATED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    assert_eq!(app.store.commission_count(), 0);
}

#[tokio::test]
async fn provider_lookup_failure_is_bad_gateway() {
    let app = TestApp::spawn().await;
    app.mock_create_order(AMOUNT_MINOR).await;
    app.checkout(2).await;
    Mock::given(method("GET"))
        .and(path(format!("/orders/{}", PROVIDER_ORDER_ID)))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&app.provider)
        .await;

    let (status, _) = app.webhook("ORDER_COMPLETED").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.store.commission_count(), 0);
    assert_eq!(checkout_status(&app).await, CheckoutStatus::Pending);
}

#[tokio::test]
async fn uncaptured_order_is_conflict() {
    let app = TestApp::spawn().await;
    app.mock_create_order(AMOUNT_MINOR).await;
    app.checkout(2).await;
    app.mock_get_order("authorised", AMOUNT_MINOR).await;

    let (status, _) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.store.commission_count(), 0);
}

#[tokio::test]
async fn amount_mismatch_is_conflict() {
    let app = TestApp::spawn().await;
    app.mock_create_order(AMOUNT_MINOR).await;
    app.checkout(2).await;
    app.mock_get_order("completed", AMOUNT_MINOR - 100).await;

    let (status, _) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.commission_count(), 0);
}

#[tokio::test]
async fn payment_without_checkout_fails_loudly() {
    let app = TestApp::spawn().await;
    app.mock_get_order("completed", AMOUNT_MINOR).await;

    let (status, body) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn recording_failure_fails_loudly_and_redelivery_recovers() {
    let app = paid_checkout().await;

    app.store.fail_recording(true);
    let (status, _) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.commission_count(), 0);
    assert_eq!(checkout_status(&app).await, CheckoutStatus::Pending);

    app.store.fail_recording(false);
    let (status, body) = app.webhook("ORDER_COMPLETED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "commission_recorded");
    assert_eq!(app.store.commission_count(), 1);
}

#[tokio::test]
async fn intermediate_events_advance_checkout_status() {
    let app = TestApp::spawn().await;
    app.mock_create_order(AMOUNT_MINOR).await;
    app.checkout(2).await;

    let (status, body) = app.webhook("ORDER_AUTHORISED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "status_updated");
    assert_eq!(checkout_status(&app).await, CheckoutStatus::Authorised);

    let (_, body) = app.webhook("ORDER_AUTHORISED").await;
    assert_eq!(body["outcome"], "no_change");

    let (_, body) = app.webhook("ORDER_PAYMENT_FAILED").await;
    assert_eq!(body["outcome"], "status_updated");
    assert_eq!(checkout_status(&app).await, CheckoutStatus::Failed);
    assert_eq!(app.store.commission_count(), 0);
}

#[tokio::test]
async fn refund_retains_commission_and_is_not_repeatable() {
    let app = paid_checkout().await;
    app.webhook("ORDER_COMPLETED").await;
    let order = app.store.order_by_provider_order(PROVIDER_ORDER_ID).unwrap();
    let uri = format!("/orders/{}/refund", order.order_id);

    let (status, body) = app.request(Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "refunded");
    assert_eq!(body["commission_action"], "retained");

    let (status, _) = app.request(Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .get(&format!("/orders/{}/commission", order.order_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn commission_for_unknown_order_is_404() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .get(&format!("/orders/{}/commission", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn completion_after_terminal_event_records_once() {
    for (event, terminal) in [
        ("ORDER_CANCELLED", CheckoutStatus::Cancelled),
        ("ORDER_PAYMENT_FAILED", CheckoutStatus::Failed),
    ] {
        let app = TestApp::spawn().await;
        app.mock_create_order(AMOUNT_MINOR).await;
        app.checkout(2).await;

        let (status, body) = app.webhook(event).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "status_updated");

        // money was captured after all: the order is still recorded
        app.mock_get_order("completed", AMOUNT_MINOR).await;
        let (status, body) = app.webhook("ORDER_COMPLETED").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["outcome"], "commission_recorded");

        let (status, body) = app.webhook("ORDER_COMPLETED").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["outcome"], "duplicate");

        assert_eq!(app.store.order_count(), 1, "{event}");
        assert_eq!(app.store.commission_count(), 1, "{event}");
        assert_eq!(checkout_status(&app).await, terminal);
    }
}
