//! Error types for brokergate

use thiserror::Error;

use crate::broker::BrokerError;

/// Main error type for brokergate operations
#[derive(Error, Debug)]
pub enum BrokerGateError {
    /// Configuration errors (missing file, bad TOML, invalid address)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Downstream broker errors
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias for brokergate operations
pub type Result<T> = std::result::Result<T, BrokerGateError>;
