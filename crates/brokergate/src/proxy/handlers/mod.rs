//! Route handlers
//!
//! Broker handlers share one shape: take the session's client (401 when there
//! is none), check required fields (400), call the broker once, and relay its
//! JSON. A failed broker call drops the session and answers 401.

pub mod account;
pub mod analyze;
pub mod auth;
pub mod market;
pub mod orders;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Query,
        rejection::{BytesRejection, JsonRejection, QueryRejection},
    },
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::error::ApiError;
use super::server::AppState;
use crate::broker::{BrokerResult, FyersClient};

/// A JSON body whose parse failure is reported by the handler itself
pub(crate) type JsonBody = Result<Json<Value>, JsonRejection>;

/// A query string whose parse failure is reported by the handler itself
pub(crate) type QueryParams<T> = Result<Query<T>, QueryRejection>;

/// A raw body whose read failure is reported by the handler itself
pub(crate) type RawBody = Result<Bytes, BytesRejection>;

pub(crate) fn require_client(state: &AppState) -> Result<Arc<FyersClient>, ApiError> {
    state
        .session
        .current_client()
        .ok_or(ApiError::NotAuthenticated)
}

pub(crate) fn json_body(body: JsonBody) -> Result<Value, ApiError> {
    body.map(|Json(value)| value).map_err(ApiError::from)
}

pub(crate) fn query_params<T>(query: QueryParams<T>) -> Result<T, ApiError> {
    query.map(|Query(params)| params).map_err(ApiError::from)
}

/// Relay a broker reply, or drop the session if the call failed
pub(crate) fn relay(
    state: &AppState,
    client: &Arc<FyersClient>,
    operation: &str,
    result: BrokerResult<Value>,
) -> Result<Json<Value>, ApiError> {
    match result {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            warn!(operation, "Broker call failed, invalidating session: {e}");
            state.session.invalidate_client(client);
            Err(ApiError::Authentication(format!(
                "broker request failed: {e}"
            )))
        }
    }
}
