//! Prompts for signal generation

use serde_json::Value;

/// Analysis prompt
///
/// Placeholders: {market_data} - pretty-printed JSON, {analysis_logic} - the
/// caller's description of how to read it
const ANALYSIS_PROMPT: &str = r#"You are a trading analyst. Analyze the market data below using the analysis logic provided and produce exactly one trading signal.

Analysis logic:
{analysis_logic}

Market data (JSON):
{market_data}

Respond with a single JSON object and nothing else, using exactly these keys:
{
  "symbol": "the instrument symbol, e.g. NSE:SBIN-EQ",
  "action": "BUY, SELL or HOLD",
  "entry_price": number,
  "stop_loss": number,
  "target_price": number,
  "reasoning": "one or two sentences explaining the signal"
}"#;

/// Default logic for `/api/scalping_signal`
///
/// Candles arrive as `[epoch, open, high, low, close, volume]` rows.
pub const SCALPING_LOGIC: &str = "Scalping on short intraday candles. Each candle is \
[epoch, open, high, low, close, volume]. Weigh the most recent candles most heavily. \
Favour BUY on strong upward momentum with rising volume, SELL on a downward trend with \
significant selling pressure, and HOLD when the market is range-bound or the data is \
insufficient. Keep the stop loss tight, within one average candle range of the entry.";

/// Build the prompt sent to the model
pub fn build_analysis_prompt(market_data: &Value, analysis_logic: &str) -> String {
    let market_data =
        serde_json::to_string_pretty(market_data).unwrap_or_else(|_| market_data.to_string());
    ANALYSIS_PROMPT
        .replace("{analysis_logic}", analysis_logic.trim())
        .replace("{market_data}", &market_data)
}
