//! Login handshake and logout

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use super::{QueryParams, query_params};
use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;

const LOGIN_COMPLETE_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><meta charset="utf-8"><title>Broker login complete</title></head>
  <body>
    <h1>Login successful</h1>
    <p>The broker session is active. You can close this window and return to the application.</p>
  </body>
</html>
"#;

pub async fn index_handler() -> &'static str {
    "Fyers trading proxy is running!"
}

/// Send the browser to the broker's login page
pub async fn login_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let request = state.session.begin_authorization()?;
    info!("Redirecting to broker login");
    Ok((StatusCode::FOUND, [(header::LOCATION, request.url)]).into_response())
}

#[derive(Debug, Deserialize, Default)]
pub struct CallbackQuery {
    pub auth_code: Option<String>,
    pub state: Option<String>,
}

/// Receive the broker's redirect and install the new credential
pub async fn auth_callback_handler(
    State(state): State<Arc<AppState>>,
    query: QueryParams<CallbackQuery>,
) -> Result<Html<&'static str>, ApiError> {
    let query = query_params(query)?;
    let auth_code = query.auth_code.filter(|c| !c.is_empty());
    let callback_state = query.state.filter(|s| !s.is_empty());

    let (auth_code, callback_state) = match (auth_code, callback_state) {
        (Some(code), Some(s)) => (code, s),
        (code, s) => {
            let missing = [("auth_code", code.is_none()), ("state", s.is_none())]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name);
            return Err(ApiError::missing(missing));
        }
    };

    state
        .session
        .complete_authorization(&auth_code, &callback_state)
        .await?;
    Ok(Html(LOGIN_COMPLETE_PAGE))
}

/// Drop the session, telling the broker first when there is one
///
/// The local session is cleared whatever the broker says.
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let Some(client) = state.session.current_client() else {
        state.session.invalidate();
        return Json(json!({"s": "ok", "message": "logged out"}));
    };

    let result = client.logout().await;
    state.session.invalidate();

    match result {
        Ok(reply) => {
            info!("Logged out from broker");
            Json(reply)
        }
        Err(e) => {
            warn!("Broker logout failed, session cleared locally: {e}");
            Json(json!({
                "s": "ok",
                "message": "logged out locally",
                "downstream_error": e.to_string(),
            }))
        }
    }
}
