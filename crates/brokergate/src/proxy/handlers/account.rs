//! Account and order-book reads

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{QueryParams, query_params, relay, require_client};
use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;

pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.profile().await;
    relay(&state, &client, "profile", result)
}

pub async fn funds_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.funds().await;
    relay(&state, &client, "funds", result)
}

pub async fn holdings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.holdings().await;
    relay(&state, &client, "holdings", result)
}

pub async fn positions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.positions().await;
    relay(&state, &client, "positions", result)
}

pub async fn tradebook_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.tradebook().await;
    relay(&state, &client, "tradebook", result)
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderbookQuery {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

pub async fn orderbook_handler(
    State(state): State<Arc<AppState>>,
    query: QueryParams<OrderbookQuery>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let query = query_params(query)?;
    let order_id = query.order_id.as_deref().filter(|id| !id.is_empty());
    let result = client.orderbook(order_id).await;
    relay(&state, &client, "orderbook", result)
}

pub async fn gtt_orderbook_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.gtt_orderbook().await;
    relay(&state, &client, "gtt_orderbook", result)
}
