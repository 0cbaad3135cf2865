//! Fyers v3 API access
//!
//! `auth` covers the authorization-code handshake, `client` the authenticated
//! trading and market-data operations.

pub mod auth;
mod client;

pub use auth::{app_id_hash, exchange_auth_code, login_url};
pub use client::FyersClient;

use thiserror::Error;

/// Errors raised while talking to the broker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// The request never produced a response (connect, timeout, TLS)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The broker answered with something that is not JSON
    #[error("invalid response (HTTP {status}): {message}")]
    InvalidResponse { status: u16, message: String },

    /// The broker answered but refused the request
    #[error("rejected by broker: {0}")]
    Rejected(String),

    /// The credential cannot be turned into a request header
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// A configured base URL is malformed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for BrokerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BrokerError::Transport(format!("request timed out: {e}"))
        } else if e.is_connect() {
            BrokerError::Transport(format!("failed to connect: {e}"))
        } else {
            BrokerError::Transport(e.to_string())
        }
    }
}

/// Result type alias for broker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Join a base URL and an endpoint path
pub(crate) fn endpoint(base: &str, path: &str) -> BrokerResult<url::Url> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    url::Url::parse(&joined).map_err(|e| BrokerError::InvalidUrl(format!("'{joined}': {e}")))
}
