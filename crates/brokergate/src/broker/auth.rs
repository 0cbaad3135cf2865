//! Authorization-code handshake against the Fyers auth endpoints
//!
//! The login page is `{api_base}/generate-authcode`; the code returned to the
//! redirect URI is traded for an access token at `{api_base}/validate-authcode`,
//! authenticated by `appIdHash = sha256("{client_id}:{secret_key}")`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use super::{BrokerError, BrokerResult, endpoint};
use crate::config::OAuthSettings;

/// Hex-encoded SHA-256 of `"{client_id}:{secret_key}"`
pub fn app_id_hash(client_id: &str, secret_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{client_id}:{secret_key}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the provider login URL for one handshake
pub fn login_url(api_base: &str, settings: &OAuthSettings<'_>, state: &str) -> BrokerResult<Url> {
    let mut url = endpoint(api_base, "/generate-authcode")?;
    url.query_pairs_mut()
        .append_pair("client_id", settings.client_id)
        .append_pair("redirect_uri", settings.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", state);
    Ok(url)
}

#[derive(Debug, Serialize)]
struct ValidateAuthCodeRequest<'a> {
    grant_type: &'static str,
    #[serde(rename = "appIdHash")]
    app_id_hash: String,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ValidateAuthCodeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Trade an authorization code for an access token
///
/// Fails on transport errors, non-JSON replies, and replies without a usable
/// `access_token`, regardless of the HTTP status the provider sent.
pub async fn exchange_auth_code(
    http: &Client,
    api_base: &str,
    settings: &OAuthSettings<'_>,
    auth_code: &str,
) -> BrokerResult<String> {
    let url = endpoint(api_base, "/validate-authcode")?;
    let request = ValidateAuthCodeRequest {
        grant_type: "authorization_code",
        app_id_hash: app_id_hash(settings.client_id, settings.secret_key),
        code: auth_code,
    };

    debug!("Exchanging authorization code at {url}");
    let response = http.post(url).json(&request).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    let parsed: ValidateAuthCodeResponse =
        serde_json::from_str(&body).map_err(|e| BrokerError::InvalidResponse {
            status,
            message: format!("token endpoint returned non-JSON body: {e}"),
        })?;

    match parsed.access_token.filter(|t| !t.is_empty()) {
        Some(token) => Ok(token),
        None => {
            let message = parsed
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "response did not contain an access_token".to_string());
            Err(BrokerError::Rejected(match parsed.code {
                Some(code) => format!("{message} (code {code})"),
                None => message,
            }))
        }
    }
}
