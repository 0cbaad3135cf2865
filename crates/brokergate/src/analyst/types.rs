//! Signal types and parsing of model answers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys every signal must carry
pub const REQUIRED_SIGNAL_FIELDS: [&str; 6] = [
    "symbol",
    "action",
    "entry_price",
    "stop_loss",
    "target_price",
    "reasoning",
];

/// A trading signal as produced by the model
///
/// Values are kept as the model wrote them; a price may arrive as a number
/// or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: Value,
    pub action: Value,
    pub entry_price: Value,
    pub stop_loss: Value,
    pub target_price: Value,
    pub reasoning: Value,
}

/// Analyst-specific errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalystError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Invalid model response: {reason}")]
    Format { reason: String, raw: String },
}

/// Parse a model answer into a [`TradingSignal`]
///
/// Accepts the JSON object bare or wrapped in a Markdown code fence. A
/// required key that is absent or `null` counts as missing.
pub fn parse_signal(raw: &str) -> Result<TradingSignal, AnalystError> {
    let format_error = |reason: String| AnalystError::Format {
        reason,
        raw: raw.to_string(),
    };

    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| format_error(format!("response is not valid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| format_error("response is not a JSON object".to_string()))?;

    let missing: Vec<&str> = REQUIRED_SIGNAL_FIELDS
        .iter()
        .copied()
        .filter(|field| object.get(*field).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(format_error(format!(
            "response is missing required field(s): {}",
            missing.join(", ")
        )));
    }

    serde_json::from_value(value).map_err(|e| format_error(e.to_string()))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // An info string ("json") can only sit before the first newline
    match rest.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with(['{', '[']) => body.trim(),
        _ => {
            let rest = rest.trim();
            rest.strip_prefix("json").unwrap_or(rest).trim()
        }
    }
}
