//! Brokergate - authenticating proxy for the Fyers trading API
//!
//! Holds one broker session for the whole process, relays account, market
//! and order calls to the broker, and asks a text-generation model for
//! trading signals.

pub mod analyst;
pub mod broker;
pub mod config;
pub mod error;
pub mod proxy;
pub mod session;
pub mod testing;

pub use error::BrokerGateError;
