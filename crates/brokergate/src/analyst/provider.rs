//! Signal provider trait
//!
//! Abstracts the text-generation backend so handlers and tests do not care
//! which model produced the text.

use async_trait::async_trait;

use super::types::AnalystError;

/// Trait for text-generation backends
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Send a prompt and return the model's raw text answer
    async fn generate(&self, prompt: &str) -> Result<String, AnalystError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
