//! HTTP surface over the order core.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::aggregates::{CartLine, Order, OrderStatus};
use crate::services::{AppliedCoupon, CartError, CartService, OrderRequest, OrderService};
use crate::OrderError;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub carts: Arc<CartService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "greencart-orders"})) }))
        .route("/api/v1/orders", post(place_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/status", put(update_status))
        .route("/api/v1/customers/:id/orders", get(customer_orders))
        .route("/api/v1/coupons/validate", post(validate_coupon))
        .route("/api/v1/cart/:customer_id", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:customer_id/items", post(add_to_cart))
        .route("/api/v1/cart/:customer_id/items/:product_id/decrement", post(decrement_cart_item))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(serde_json::json!({"error": code, "message": message}))).into_response()
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidOrderRequest(_) | Self::Coupon(_) => StatusCode::BAD_REQUEST,
            Self::ProductNotFound(_) | Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } | Self::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
            Self::OrderPlacementFailed(_) | Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        error_body(status, self.code(), self.to_string())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            Self::NotEnoughStock { .. } => (StatusCode::CONFLICT, "NOT_ENOUGH_STOCK"),
            Self::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            Self::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR"),
        };
        error_body(status, code, self.to_string())
    }
}

async fn place_order(State(s): State<AppState>, Json(r): Json<OrderRequest>) -> Result<(StatusCode, Json<Order>), OrderError> {
    Ok((StatusCode::CREATED, Json(s.orders.place_order(r).await?)))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<i64>) -> Result<Json<Order>, OrderError> {
    Ok(Json(s.orders.get_order_by_id(id).await?))
}

#[derive(Debug, Deserialize)] pub struct StatusUpdateRequest { pub status: String }

async fn update_status(State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<StatusUpdateRequest>) -> Result<Json<Order>, OrderError> {
    let status: OrderStatus = r.status.parse().map_err(OrderError::InvalidOrderRequest)?;
    Ok(Json(s.orders.update_order_status(id, status).await?))
}

async fn customer_orders(State(s): State<AppState>, Path(id): Path<i64>) -> Result<Json<Vec<Order>>, OrderError> {
    Ok(Json(s.orders.orders_for_customer(id).await?))
}

#[derive(Debug, Deserialize)] pub struct CouponQuoteRequest { pub code: String, pub order_total: Decimal }

async fn validate_coupon(State(s): State<AppState>, Json(r): Json<CouponQuoteRequest>) -> Result<Json<AppliedCoupon>, OrderError> {
    Ok(Json(s.orders.preview_coupon(&r.code, r.order_total).await?))
}

async fn get_cart(State(s): State<AppState>, Path(customer_id): Path<i64>) -> Result<Json<Vec<CartLine>>, CartError> {
    Ok(Json(s.carts.lines(customer_id).await?))
}

#[derive(Debug, Deserialize)] pub struct AddToCartRequest { pub product_id: i64, pub quantity: i32 }

async fn add_to_cart(State(s): State<AppState>, Path(customer_id): Path<i64>, Json(r): Json<AddToCartRequest>) -> Result<(StatusCode, Json<CartLine>), CartError> {
    Ok((StatusCode::CREATED, Json(s.carts.add_item(customer_id, r.product_id, r.quantity).await?)))
}

async fn decrement_cart_item(State(s): State<AppState>, Path((customer_id, product_id)): Path<(i64, i64)>) -> Result<Json<Option<CartLine>>, CartError> {
    Ok(Json(s.carts.decrement_item(customer_id, product_id).await?))
}

async fn clear_cart(State(s): State<AppState>, Path(customer_id): Path<i64>) -> Result<StatusCode, CartError> {
    s.carts.clear(customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
