//! HTTP server exposing the broker proxy
//!
//! One router serves the login handshake, the broker pass-through routes and
//! the signal endpoints. All of them share a single [`AppState`].

use axum::{
    Json, Router,
    extract::State,
    http::{Method, Uri},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handlers::{account, analyze, auth, market, orders};
use crate::analyst::SignalProvider;
use crate::config::ServerConfig;
use crate::error::{BrokerGateError, Result};
use crate::session::SessionManager;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// The process-wide broker session
    pub session: Arc<SessionManager>,
    /// Text-generation backend; `None` when no API key is configured
    pub analyst: Option<Arc<dyn SignalProvider>>,
}

/// The proxy server
pub struct ProxyServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ProxyServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Bind the listen address and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| BrokerGateError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting proxy server on {addr}");
        if self.state.session.is_authenticated() {
            tracing::info!("Broker session: active");
        } else {
            tracing::info!("Broker session: none (visit /login to authenticate)");
        }
        match &self.state.analyst {
            Some(provider) => tracing::info!("Signal provider: {}", provider.name()),
            None => tracing::info!("Signal provider: disabled"),
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BrokerGateError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| BrokerGateError::Server(format!("Server error: {e}")))?;

        tracing::info!("Proxy server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(auth::index_handler))
        .route("/health", get(health_handler))
        .route("/login", get(auth::login_handler))
        .route("/auth-callback", get(auth::auth_callback_handler))
        .route("/api/logout", get(auth::logout_handler))
        // Account
        .route("/api/profile", get(account::profile_handler))
        .route("/api/funds", get(account::funds_handler))
        .route("/api/holdings", get(account::holdings_handler))
        .route("/api/positions", get(account::positions_handler))
        .route("/api/tradebook", get(account::tradebook_handler))
        .route("/api/orderbook", get(account::orderbook_handler))
        .route("/api/gtt_orderbook", get(account::gtt_orderbook_handler))
        // Market data
        .route("/api/market_status", get(market::market_status_handler))
        .route("/api/quotes", get(market::quotes_handler))
        .route("/api/history", post(market::history_handler))
        .route("/api/depth", post(market::depth_handler))
        .route("/api/optionchain", post(market::option_chain_handler))
        // Orders
        .route("/api/place_order", post(orders::place_order_handler))
        .route("/api/modify_order", post(orders::modify_order_handler))
        .route("/api/cancel_order", post(orders::cancel_order_handler))
        .route(
            "/api/place_basket_orders",
            post(orders::place_basket_orders_handler),
        )
        .route(
            "/api/modify_basket_orders",
            post(orders::modify_basket_orders_handler),
        )
        .route(
            "/api/place_multileg_order",
            post(orders::place_multileg_order_handler),
        )
        .route("/api/place_gtt_order", post(orders::place_gtt_order_handler))
        .route("/api/modify_gtt_order", post(orders::modify_gtt_order_handler))
        .route("/api/cancel_gtt_order", post(orders::cancel_gtt_order_handler))
        // Signals
        .route("/api/gemini/analyze", post(analyze::analyze_handler))
        .route(
            "/api/scalping_signal",
            post(analyze::scalping_signal_handler),
        )
        .method_not_allowed_fallback(method_not_allowed_handler)
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

async fn method_not_allowed_handler(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method.to_string())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "authenticated": state.session.is_authenticated(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::testing::MockSignalProvider;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn create_test_state(broker: BrokerConfig) -> Arc<AppState> {
        Arc::new(AppState {
            session: Arc::new(SessionManager::new(broker, reqwest::Client::new())),
            analyst: None,
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = create_test_state(BrokerConfig::default());
        let app = create_router(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "authenticated": false})
        );

        state.session.configure_from_token("token", "APP-100");
        let response = create_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["authenticated"], true);
    }

    #[tokio::test]
    async fn test_index_banner() {
        let app = create_router(create_test_state(BrokerConfig::default()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Fyers trading proxy is running!");
    }

    #[tokio::test]
    async fn test_login_without_configuration() {
        let app = create_router(create_test_state(BrokerConfig::default()));
        let response = app
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("client_id"));
    }

    #[tokio::test]
    async fn test_login_redirects_to_broker() {
        let state = create_test_state(BrokerConfig {
            client_id: Some("APP-100".to_string()),
            secret_key: Some("secret".to_string()),
            redirect_uri: Some("https://example.com/auth-callback".to_string()),
            ..Default::default()
        });
        let response = create_router(state)
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.contains("/generate-authcode?"));
        assert!(location.contains("client_id=APP-100"));
        assert!(location.contains("response_type=code"));
    }

    #[tokio::test]
    async fn test_analyze_without_provider() {
        let app = create_router(create_test_state(BrokerConfig::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/gemini/analyze")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"market_data": {}, "analysis_logic": "trend"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_analyze_validates_before_calling_provider() {
        let provider = Arc::new(MockSignalProvider::with_response("{}"));
        let state = Arc::new(AppState {
            session: Arc::new(SessionManager::new(
                BrokerConfig::default(),
                reqwest::Client::new(),
            )),
            analyst: Some(provider.clone()),
        });

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/gemini/analyze")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"market_data": {"ltp": 600}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "missing required field(s): analysis_logic"
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_router(create_test_state(BrokerConfig::default()));
        let response = app
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "no route for /api/nope");
    }
}
