//! HTTP surface of the proxy
//!
//! - `server`: router, shared state and serve loop
//! - `handlers`: one module per route group
//! - `validation`: required-field checks on request bodies
//! - `error`: mapping of failures to JSON responses

pub mod error;
pub mod handlers;
pub mod server;
pub mod validation;

pub use error::ApiError;
pub use server::{AppState, ProxyServer, create_router};
