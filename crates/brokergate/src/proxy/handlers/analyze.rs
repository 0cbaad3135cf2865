//! Signal generation endpoints

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use super::{JsonBody, RawBody, json_body, relay, require_client};
use crate::analyst::{SCALPING_LOGIC, SignalProvider, TradingSignal, build_analysis_prompt, parse_signal};
use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;
use crate::proxy::validation::require_fields;

const DEFAULT_SYMBOL: &str = "NSE:SBIN-EQ";
const DEFAULT_RESOLUTION: &str = "5";
const DEFAULT_WINDOW_SECS: i64 = 2 * 60 * 60;

/// Analyse caller-supplied market data; no broker session is involved
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Json<Value>, ApiError> {
    let payload = json_body(body)?;
    require_fields(&payload, &["market_data", "analysis_logic"])?;

    let analysis_logic = match &payload["analysis_logic"] {
        Value::String(logic) => logic.clone(),
        other => other.to_string(),
    };

    let signal = run_analysis(&state, &payload["market_data"], &analysis_logic).await?;
    Ok(Json(json!({ "signal": signal })))
}

/// Fetch recent candles from the broker and analyse them for a scalp
///
/// Every body field is optional. Without `range_from`/`range_to` the window
/// is the two hours ending at the last completed minute.
pub async fn scalping_signal_handler(
    State(state): State<Arc<AppState>>,
    body: RawBody,
) -> Result<Json<Value>, ApiError> {
    let client = require_client(&state)?;
    let body = body?;

    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?
    };
    let params = history_params(&payload, Utc::now().timestamp())?;

    let result = client.history(&params).await;
    let Json(history) = relay(&state, &client, "history", result)?;

    if history.get("s").and_then(Value::as_str) != Some("ok") {
        return Err(ApiError::Downstream {
            message: "Failed to fetch historical data from the broker".to_string(),
            details: history,
        });
    }

    let signal = run_analysis(&state, &history, SCALPING_LOGIC).await?;
    Ok(Json(json!({
        "signal": signal,
        "symbol": params["symbol"],
        "resolution": params["resolution"],
        "range_from": params["range_from"],
        "range_to": params["range_to"],
    })))
}

async fn run_analysis(
    state: &AppState,
    market_data: &Value,
    analysis_logic: &str,
) -> Result<TradingSignal, ApiError> {
    let provider: &dyn SignalProvider = state.analyst.as_deref().ok_or_else(|| {
        ApiError::Configuration("text-generation API key is not configured".to_string())
    })?;

    let prompt = build_analysis_prompt(market_data, analysis_logic);
    debug!(provider = provider.name(), "Requesting signal ({} prompt chars)", prompt.len());

    let raw = provider.generate(&prompt).await?;
    let signal = parse_signal(&raw)?;
    info!(provider = provider.name(), "Generated signal: {} {}", signal.action, signal.symbol);
    Ok(signal)
}

/// History request parameters with defaults filled in
fn history_params(payload: &Value, now_epoch: i64) -> Result<Value, ApiError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("request body must be a JSON object".to_string()))?;

    let text = |key: &str| -> Option<String> {
        match object.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    };

    let (range_from, range_to) = match (text("range_from"), text("range_to")) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            let range_to = now_epoch - now_epoch.rem_euclid(60) - 60;
            let range_from = range_to - DEFAULT_WINDOW_SECS;
            debug!("Using default history range {range_from}..{range_to}");
            (range_from.to_string(), range_to.to_string())
        }
    };

    Ok(json!({
        "symbol": text("symbol").unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
        "resolution": text("resolution").unwrap_or_else(|| DEFAULT_RESOLUTION.to_string()),
        "range_from": range_from,
        "range_to": range_to,
        "cont_flag": text("cont_flag").unwrap_or_else(|| "1".to_string()),
    }))
}
