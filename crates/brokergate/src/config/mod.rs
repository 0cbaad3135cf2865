use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{BrokerGateError, Result};

/// Main configuration structure for brokergate
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Fyers application and endpoint configuration
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Gemini text-generation configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:5000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Timeout in seconds for downstream broker requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Fyers application configuration
///
/// Every credential field is optional so the server can boot without them;
/// routes that need a missing value answer with a configuration error instead.
#[derive(Clone, Deserialize)]
pub struct BrokerConfig {
    /// Fyers application id (e.g. "XC4XXXXM-100")
    #[serde(default)]
    pub client_id: Option<String>,
    /// Fyers application secret
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Redirect URI registered with the Fyers application
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Pre-provisioned access token, installed at startup when present
    #[serde(default)]
    pub access_token: Option<String>,
    /// Base URL for trading and auth endpoints
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Base URL for market-data endpoints
    #[serde(default = "default_data_base_url")]
    pub data_base_url: String,
    /// Reject callbacks whose `state` does not match the pending login
    #[serde(default = "default_verify_state")]
    pub verify_state: bool,
    /// Fetch the profile once at startup to check a pre-provisioned token
    #[serde(default = "default_verify_token_on_startup")]
    pub verify_token_on_startup: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            secret_key: None,
            redirect_uri: None,
            access_token: None,
            api_base_url: default_api_base_url(),
            data_base_url: default_data_base_url(),
            verify_state: default_verify_state(),
            verify_token_on_startup: default_verify_token_on_startup(),
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("client_id", &self.client_id)
            .field("secret_key_set", &self.secret_key.is_some())
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token_set", &self.access_token.is_some())
            .field("api_base_url", &self.api_base_url)
            .field("data_base_url", &self.data_base_url)
            .field("verify_state", &self.verify_state)
            .field("verify_token_on_startup", &self.verify_token_on_startup)
            .finish()
    }
}

/// The three values an authorization-code login needs
#[derive(Debug, Clone, Copy)]
pub struct OAuthSettings<'a> {
    pub client_id: &'a str,
    pub secret_key: &'a str,
    pub redirect_uri: &'a str,
}

impl BrokerConfig {
    /// Borrow the login settings, or name every one that is missing
    pub fn oauth_settings(&self) -> std::result::Result<OAuthSettings<'_>, String> {
        let client_id = non_empty(&self.client_id);
        let secret_key = non_empty(&self.secret_key);
        let redirect_uri = non_empty(&self.redirect_uri);

        match (client_id, secret_key, redirect_uri) {
            (Some(client_id), Some(secret_key), Some(redirect_uri)) => Ok(OAuthSettings {
                client_id,
                secret_key,
                redirect_uri,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("client_id", client_id.is_none()),
                    ("secret_key", secret_key.is_none()),
                    ("redirect_uri", redirect_uri.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                Err(format!(
                    "broker configuration incomplete, missing: {}",
                    missing.join(", ")
                ))
            }
        }
    }

    /// The application id, if configured
    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.client_id)
    }

    /// The pre-provisioned access token, if configured
    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn default_api_base_url() -> String {
    "https://api-t1.fyers.in/api/v3".to_string()
}

fn default_data_base_url() -> String {
    "https://api-t1.fyers.in/data".to_string()
}

fn default_verify_state() -> bool {
    true
}

fn default_verify_token_on_startup() -> bool {
    true
}

/// Gemini text-generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// API base URL
    #[serde(default = "default_gemini_api_url")]
    pub api_url: String,
    /// Environment variable name for API key
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default = "default_gemini_temperature")]
    pub temperature: f32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: default_gemini_api_url(),
            api_key_env: default_gemini_api_key_env(),
            model: default_gemini_model(),
            timeout_secs: default_gemini_timeout_secs(),
            temperature: default_gemini_temperature(),
        }
    }
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_timeout_secs() -> u64 {
    60
}

fn default_gemini_temperature() -> f32 {
    0.2
}

impl Config {
    /// Load configuration from an explicit path or the default locations
    ///
    /// Falls back to defaults when no file exists. Environment overrides are
    /// not applied here; see [`Config::apply_env`].
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".brokergate").join("config.toml")),
            dirs::config_dir().map(|c| c.join("brokergate").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            BrokerGateError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| BrokerGateError::Config(format!("Failed to parse config: {e}")))
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup
    ///
    /// Recognised keys: `FYERS_CLIENT_ID`, `FYERS_SECRET_KEY`,
    /// `FYERS_REDIRECT_URI`, `FYERS_ACCESS_TOKEN`, `PORT`. Empty values are
    /// ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("FYERS_CLIENT_ID") {
            self.broker.client_id = Some(v);
        }
        if let Some(v) = get("FYERS_SECRET_KEY") {
            self.broker.secret_key = Some(v);
        }
        if let Some(v) = get("FYERS_REDIRECT_URI") {
            self.broker.redirect_uri = Some(v);
        }
        if let Some(v) = get("FYERS_ACCESS_TOKEN") {
            self.broker.access_token = Some(v);
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    let host = self
                        .server
                        .listen_addr
                        .rsplit_once(':')
                        .map(|(host, _)| host.to_string())
                        .unwrap_or_else(|| "0.0.0.0".to_string());
                    self.server.listen_addr = format!("{host}:{port}");
                }
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {port}"),
            }
        }
    }
}
