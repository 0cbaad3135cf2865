//! Order placement and management
//!
//! Payloads are forwarded exactly as received once the required fields are
//! present.

use axum::{Json, extract::State};
use serde_json::Value;
use std::sync::Arc;

use super::{JsonBody, json_body, relay, require_client};
use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;
use crate::proxy::validation::{require_fields, require_non_empty_array};

/// Fields the broker rejects a single order without
const ORDER_FIELDS: &[&str] = &["symbol", "qty", "type", "side", "productType"];

pub async fn place_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, ORDER_FIELDS)?;
    let result = client.place_order(&order).await;
    relay(&state, &client, "place_order", result)
}

pub async fn modify_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, &["id"])?;
    let result = client.modify_order(&order).await;
    relay(&state, &client, "modify_order", result)
}

pub async fn cancel_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, &["id"])?;
    let result = client.cancel_order(&order).await;
    relay(&state, &client, "cancel_order", result)
}

pub async fn place_basket_orders_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let orders = json_body(body)?;
    require_non_empty_array(&orders)?;
    let result = client.place_basket_orders(&orders).await;
    relay(&state, &client, "place_basket_orders", result)
}

pub async fn modify_basket_orders_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let orders = json_body(body)?;
    require_non_empty_array(&orders)?;
    let result = client.modify_basket_orders(&orders).await;
    relay(&state, &client, "modify_basket_orders", result)
}

pub async fn place_multileg_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, &["legs"])?;
    let result = client.place_multileg_order(&order).await;
    relay(&state, &client, "place_multileg_order", result)
}

pub async fn place_gtt_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, &["orderInfo"])?;
    let result = client.place_gtt_order(&order).await;
    relay(&state, &client, "place_gtt_order", result)
}

pub async fn modify_gtt_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, &["id", "orderInfo"])?;
    let result = client.modify_gtt_order(&order).await;
    relay(&state, &client, "modify_gtt_order", result)
}

pub async fn cancel_gtt_order_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let order = json_body(body)?;
    require_fields(&order, &["id"])?;
    let result = client.cancel_gtt_order(&order).await;
    relay(&state, &client, "cancel_gtt_order", result)
}
