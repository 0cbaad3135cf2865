//! Trading-signal analysis backed by a text-generation model
//!
//! The model is an opaque collaborator behind [`SignalProvider`]; this module
//! only builds the prompt and checks that the answer is a well-formed signal.

mod gemini;
mod prompts;
mod provider;
mod types;

pub use gemini::GeminiProvider;
pub use prompts::{SCALPING_LOGIC, build_analysis_prompt};
pub use provider::SignalProvider;
pub use types::{AnalystError, REQUIRED_SIGNAL_FIELDS, TradingSignal, parse_signal};
