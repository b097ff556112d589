mod common;

use axum::http::StatusCode;
use chrono::Utc;
use commission_service::models::CatalogItem;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn margin_zones_for_sellable_item() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .get(&format!("/items/{}/margin-zones", app.item_id))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_sellable"], true);
    assert_eq!(body["min_rate"], 1.0);
    assert_eq!(body["max_rate"], 37.5);
    assert_eq!(body["current_margin_rate"], 20.0);
    assert_eq!(body["current_zone"], "orange");

    let green_end = body["green_zone_end"].as_f64().unwrap();
    let orange_end = body["orange_zone_end"].as_f64().unwrap();
    assert!(1.0 <= green_end && green_end <= orange_end && orange_end <= 37.5);
}

#[tokio::test]
async fn margin_zones_flag_unsellable_item() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .get(&format!("/items/{}/margin-zones", app.unsellable_item_id))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_sellable"], false);
}

#[tokio::test]
async fn margin_zones_for_unknown_item_is_404() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .get(&format!("/items/{}/margin-zones", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn save_margin_returns_price_breakdown() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .send_json(
            "PUT",
            &format!("/items/{}/margin", app.item_id),
            json!({ "margin_rate": 20.0 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["margin_rate"], 20.0);
    assert_eq!(body["final_customer_price"], 125.0);
    assert_eq!(body["affiliate_take_home"], 120.0);
    assert_eq!(body["zone"], "orange");
}

#[tokio::test]
async fn save_margin_at_ceiling_succeeds_and_above_is_rejected() {
    let app = TestApp::spawn().await;
    let uri = format!("/items/{}/margin", app.item_id);

    let (status, body) = app
        .send_json("PUT", &uri, json!({ "margin_rate": 37.5 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .send_json("PUT", &uri, json!({ "margin_rate": 37.6 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "MARGIN_EXCEEDS_PUBLIC_PRICE");
    assert_eq!(body["details"]["requested_rate"], 37.6);
    assert_eq!(body["details"]["max_allowed_rate"], 37.5);

    // the rejected save did not overwrite the stored margin
    let (_, zones) = app
        .get(&format!("/items/{}/margin-zones", app.item_id))
        .await;
    assert_eq!(zones["current_margin_rate"], 37.5);
}

#[tokio::test]
async fn save_margin_below_floor_is_invalid_input() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .send_json(
            "PUT",
            &format!("/items/{}/margin", app.item_id),
            json!({ "margin_rate": 0.5 }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn save_margin_on_unsellable_item_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .send_json(
            "PUT",
            &format!("/items/{}/margin", app.unsellable_item_id),
            json!({ "margin_rate": 2.0 }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NON_SELLABLE_ITEM");
}

#[tokio::test]
async fn advertised_max_rate_is_always_saveable() {
    let app = TestApp::spawn().await;
    // ceiling 149.96 × 0.95 = 142.462, so the true max is 37.462%
    let item_id = Uuid::new_v4();
    app.store
        .insert_item(CatalogItem {
            item_id,
            selection_id: app.selection_id,
            affiliate_id: app.affiliate_id,
            product_id: Uuid::new_v4(),
            base_price_excl_tax: 100.0,
            margin_rate: 10.0,
            public_price_excl_tax: Some(149.96),
            updated_utc: Utc::now(),
        })
        .unwrap();

    let (status, zones) = app.get(&format!("/items/{}/margin-zones", item_id)).await;
    assert_eq!(status, StatusCode::OK, "{zones}");
    assert_eq!(zones["max_rate"], 37.4);
    assert_eq!(zones["max_allowed_selling_price"], 142.46);
    let orange_end = zones["orange_zone_end"].as_f64().unwrap();
    assert!(orange_end <= 37.4);

    let uri = format!("/items/{}/margin", item_id);
    let (status, body) = app
        .send_json("PUT", &uri, json!({ "margin_rate": zones["max_rate"] }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .send_json("PUT", &uri, json!({ "margin_rate": 37.5 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["max_allowed_rate"], 37.4);
}
