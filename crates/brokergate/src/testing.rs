//! Test utilities for brokergate
//!
//! A scripted [`SignalProvider`] and helpers for pointing the broker
//! configuration at a mock server.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::analyst::{AnalystError, SignalProvider};
use crate::config::BrokerConfig;

/// Signal provider that answers every prompt with a fixed result
#[derive(Debug)]
pub struct MockSignalProvider {
    reply: Result<String, AnalystError>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockSignalProvider {
    pub fn with_response(text: impl Into<String>) -> Self {
        Self::with_result(Ok(text.into()))
    }

    pub fn with_error(error: AnalystError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(reply: Result<String, AnalystError>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Number of prompts received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent prompt, if any
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SignalProvider for MockSignalProvider {
    async fn generate(&self, prompt: &str) -> Result<String, AnalystError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(prompt.to_string());
        self.reply.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Broker configuration with login settings and both base URLs at `base_url`
///
/// Trading endpoints live under `{base_url}/api/v3`, market data under
/// `{base_url}/data`, mirroring the real host layout.
pub fn mock_broker_config(base_url: &str) -> BrokerConfig {
    let base_url = base_url.trim_end_matches('/');
    BrokerConfig {
        client_id: Some("APP-100".to_string()),
        secret_key: Some("secret".to_string()),
        redirect_uri: Some("http://localhost:5000/auth-callback".to_string()),
        access_token: None,
        api_base_url: format!("{base_url}/api/v3"),
        data_base_url: format!("{base_url}/data"),
        verify_state: true,
        verify_token_on_startup: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_records_prompts() {
        let provider = MockSignalProvider::with_response("{}");
        assert_eq!(provider.call_count(), 0);
        assert!(provider.last_prompt().is_none());

        assert_eq!(provider.generate("first").await.unwrap(), "{}");
        provider.generate("second").await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.last_prompt().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn mock_provider_replays_errors() {
        let provider = MockSignalProvider::with_error(AnalystError::Api("quota".into()));
        let err = provider.generate("prompt").await.unwrap_err();
        assert_eq!(err, AnalystError::Api("quota".into()));
    }

    #[test]
    fn mock_config_splits_hosts() {
        let config = mock_broker_config("http://127.0.0.1:9000/");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000/api/v3");
        assert_eq!(config.data_base_url, "http://127.0.0.1:9000/data");
        assert!(config.oauth_settings().is_ok());
    }
}
