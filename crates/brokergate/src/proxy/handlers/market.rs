//! Market-data reads

use axum::{
    Json,
    extract::{RawQuery, State},
};
use serde_json::Value;
use std::sync::Arc;

use super::{JsonBody, json_body, relay, require_client};
use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;
use crate::proxy::validation::require_fields;

pub async fn market_status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let result = client.market_status().await;
    relay(&state, &client, "market_status", result)
}

/// `symbols` may be repeated or comma-separated; both forward as one list
pub async fn quotes_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let symbols = symbols_from_query(query.as_deref().unwrap_or_default())
        .ok_or_else(|| ApiError::missing(["symbols"]))?;
    let result = client.quotes(&symbols).await;
    relay(&state, &client, "quotes", result)
}

pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let payload = json_body(body)?;
    require_fields(&payload, &["symbol", "resolution", "range_from", "range_to"])?;
    let result = client.history(&payload).await;
    relay(&state, &client, "history", result)
}

pub async fn depth_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let payload = json_body(body)?;
    require_fields(&payload, &["symbol"])?;
    let result = client.depth(&payload).await;
    relay(&state, &client, "depth", result)
}

pub async fn option_chain_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let payload = json_body(body)?;
    require_fields(&payload, &["symbol"])?;
    let result = client.option_chain(&payload).await;
    relay(&state, &client, "optionchain", result)
}

/// Collect every `symbols` value into one comma-joined list
fn symbols_from_query(query: &str) -> Option<String> {
    let symbols: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "symbols")
        .flat_map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    (!symbols.is_empty()).then(|| symbols.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_single_list() {
        assert_eq!(
            symbols_from_query("symbols=NSE:SBIN-EQ,NSE:TCS-EQ").as_deref(),
            Some("NSE:SBIN-EQ,NSE:TCS-EQ")
        );
    }

    #[test]
    fn test_symbols_repeated_keys_are_joined() {
        assert_eq!(
            symbols_from_query("symbols=NSE%3ASBIN-EQ&other=1&symbols=NSE:TCS-EQ").as_deref(),
            Some("NSE:SBIN-EQ,NSE:TCS-EQ")
        );
    }

    #[test]
    fn test_symbols_missing_or_blank() {
        assert!(symbols_from_query("").is_none());
        assert!(symbols_from_query("symbols=").is_none());
        assert!(symbols_from_query("symbol=NSE:SBIN-EQ").is_none());
    }
}
