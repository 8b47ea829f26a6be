mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use greencart_orders::api::{router, AppState};
use greencart_orders::domain::aggregates::Coupon;
use greencart_orders::services::CartService;

async fn app() -> (Harness, Router) {
    let h = Harness::new().await;
    seed_product(&h.store, 1, dec!(250), 5).await;
    seed_coupon(&h.store, Coupon::percentage(1, code("SAVE10"), dec!(10)).with_max_discount(dec!(50))).await;
    let state = AppState { orders: h.orders.clone(), carts: Arc::new(CartService::new(Arc::new(h.store.clone()))) };
    (h, router(state))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri).header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn order_body(quantity: i32, coupon: Option<&str>) -> Value {
    json!({
        "customer_id": CUSTOMER,
        "items": [{"product_id": 1, "product_name": "Brass Lamp", "unit_price": "250", "quantity": quantity}],
        "coupon_code": coupon,
        "city": "Jaipur",
    })
}

#[tokio::test]
async fn test_health() {
    let (_h, app) = app().await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_place_and_fetch_order() {
    let (_h, app) = app().await;
    let (status, order) = call(&app, "POST", "/api/v1/orders", Some(order_body(2, Some("SAVE10")))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(decimal(&order["total_amount"]), dec!(450));
    assert_eq!(order["city"], "Jaipur");

    let id = order["id"].as_i64().unwrap();
    let (status, fetched) = call(&app, "GET", &format!("/api/v1/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["items"][0]["product_name"], "Brass Lamp");

    let (status, listed) = call(&app, "GET", &format!("/api/v1/customers/{CUSTOMER}/orders"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejections_map_to_status_codes() {
    let (_h, app) = app().await;

    let (status, body) = call(&app, "POST", "/api/v1/orders", Some(order_body(9, None))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INSUFFICIENT_STOCK");

    let (status, body) = call(&app, "POST", "/api/v1/orders", Some(order_body(1, Some("BADCODE")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_COUPON_CODE");

    let (status, body) = call(&app, "POST", "/api/v1/orders", Some(json!({"customer_id": CUSTOMER, "items": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_ORDER_REQUEST");

    let (status, body) = call(&app, "GET", "/api/v1/orders/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_items_are_bad_requests() {
    let (h, app) = app().await;
    let items = [
        json!({"product_id": 1, "product_name": "Brass Lamp", "quantity": 1}),
        json!({"product_id": 1, "product_name": "Brass Lamp", "unit_price": "250"}),
        json!({"product_id": 1, "product_name": "Brass Lamp", "unit_price": "0.125", "quantity": 2}),
        json!({"product_id": 1, "product_name": "Brass Lamp", "unit_price": "79228162514264337593543950335", "quantity": 2}),
    ];
    for item in items {
        let (status, body) = call(&app, "POST", "/api/v1/orders", Some(json!({"customer_id": CUSTOMER, "items": [item]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["error"], "INVALID_ORDER_REQUEST");
    }
    assert_eq!(h.store.product(1).await.unwrap().stock_quantity, 5);
}

#[tokio::test]
async fn test_status_updates() {
    let (_h, app) = app().await;
    let (_, order) = call(&app, "POST", "/api/v1/orders", Some(order_body(1, None))).await;
    let uri = format!("/api/v1/orders/{}/status", order["id"]);

    let (status, shipped) = call(&app, "PUT", &uri, Some(json!({"status": "shipped"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["status"], "SHIPPED");
    assert!(shipped["tracking_number"].as_str().unwrap().starts_with("TRK"));

    let (status, body) = call(&app, "PUT", &uri, Some(json!({"status": "PENDING"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INVALID_STATUS_TRANSITION");

    let (status, _) = call(&app, "PUT", &uri, Some(json!({"status": "LOST"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_coupon_quote() {
    let (h, app) = app().await;
    let (status, quote) = call(&app, "POST", "/api/v1/coupons/validate", Some(json!({"code": "save10", "order_total": "1000"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&quote["discount"]), dec!(50));
    assert_eq!(h.store.coupon(&code("SAVE10")).await.unwrap().used_count, 0);
}

#[tokio::test]
async fn test_cart_routes() {
    let (h, app) = app().await;
    let base = format!("/api/v1/cart/{CUSTOMER}");

    let (status, line) = call(&app, "POST", &format!("{base}/items"), Some(json!({"product_id": 1, "quantity": 2}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(line["quantity"], 2);

    let (status, body) = call(&app, "POST", &format!("{base}/items"), Some(json!({"product_id": 1, "quantity": 4}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NOT_ENOUGH_STOCK");

    let (status, line) = call(&app, "POST", &format!("{base}/items/1/decrement"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(line["quantity"], 1);

    let (_, lines) = call(&app, "GET", &base, None).await;
    assert_eq!(lines.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "DELETE", &base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.store.cart_for(CUSTOMER).await.is_empty());
}
