//! HTTP error mapping for the proxy endpoints
//!
//! Every handler failure ends up here and leaves as a JSON body with an
//! `error` key. Nothing is allowed to reach the transport as a bare status.

use axum::{
    Json,
    extract::rejection::{BytesRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::analyst::AnalystError;
use crate::session::SessionError;

/// Errors returned to HTTP clients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// A setup value the route needs is missing
    #[error("{0}")]
    Configuration(String),

    /// Required request fields are absent
    #[error("missing required field(s): {}", .0.join(", "))]
    Validation(Vec<String>),

    /// The request body or query is unusable (malformed JSON, wrong shape)
    #[error("{0}")]
    BadRequest(String),

    /// No route matches the path
    #[error("no route for {0}")]
    NotFound(String),

    /// The route exists but not for this method
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    /// No broker session exists
    #[error("not authenticated")]
    NotAuthenticated,

    /// A downstream call failed and the session was dropped
    #[error("{0}")]
    Authentication(String),

    /// The login callback could not be completed
    #[error("{0}")]
    Authorization(String),

    /// The broker answered, but not with what the route needs
    #[error("{message}")]
    Downstream { message: String, details: Value },

    /// The text-generation service failed
    #[error("{0}")]
    Upstream(String),

    /// The text-generation service answered with an unusable signal
    #[error("{message}")]
    UpstreamFormat { message: String, raw: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotAuthenticated
            | ApiError::Authentication(_)
            | ApiError::Authorization(_) => StatusCode::UNAUTHORIZED,
            ApiError::Downstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamFormat { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a validation failure naming `fields`
    pub fn missing<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ApiError::Validation(fields.into_iter().map(Into::into).collect())
    }

    fn body(&self) -> Value {
        let mut body = json!({ "error": self.to_string() });
        match self {
            ApiError::Downstream { details, .. } => {
                body["details"] = details.clone();
            }
            ApiError::UpstreamFormat { raw, .. } => {
                body["gemini_raw_response"] = Value::String(raw.clone());
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Configuration(msg) => ApiError::Configuration(msg),
            SessionError::StateMismatch(_) | SessionError::Authorization(_) => {
                ApiError::Authorization(e.to_string())
            }
        }
    }
}

impl From<AnalystError> for ApiError {
    fn from(e: AnalystError) -> Self {
        match e {
            AnalystError::Config(msg) => ApiError::Configuration(msg),
            AnalystError::Api(msg) => ApiError::Upstream(format!("text generation failed: {msg}")),
            AnalystError::Format { reason, raw } => ApiError::UpstreamFormat {
                message: format!("text generation returned an unusable signal: {reason}"),
                raw,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("invalid query string: {}", rejection.body_text()))
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError::BadRequest(format!("unreadable request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_authenticated_body() {
        let (status, body) = render(ApiError::NotAuthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "not authenticated"}));
    }

    #[tokio::test]
    async fn test_validation_names_fields() {
        let (status, body) = render(ApiError::missing(["symbol", "range_to"])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing required field(s): symbol, range_to");
    }

    #[tokio::test]
    async fn test_upstream_format_carries_raw_text() {
        let error = ApiError::from(AnalystError::Format {
            reason: "response is not valid JSON".to_string(),
            raw: "BUY NOW".to_string(),
        });
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["gemini_raw_response"], "BUY NOW");
        assert!(body["error"].as_str().unwrap().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn test_downstream_carries_details() {
        let error = ApiError::Downstream {
            message: "Failed to fetch historical data from the broker".to_string(),
            details: json!({"s": "error", "code": -300}),
        };
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"]["code"], -300);
    }

    #[tokio::test]
    async fn test_routing_errors_are_json() {
        let (status, body) = render(ApiError::MethodNotAllowed("DELETE".into())).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({"error": "method DELETE not allowed"}));

        let (status, body) = render(ApiError::NotFound("/api/nope".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "no route for /api/nope"}));
    }

    #[test]
    fn test_session_errors_map_to_statuses() {
        let config = ApiError::from(SessionError::Configuration("missing: secret_key".into()));
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let mismatch = ApiError::from(SessionError::StateMismatch("no login is pending".into()));
        assert_eq!(mismatch.status(), StatusCode::UNAUTHORIZED);
        assert!(mismatch.to_string().contains("no login is pending"));

        let upstream = ApiError::from(AnalystError::Api("timeout".into()));
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
