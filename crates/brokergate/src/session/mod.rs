//! Broker session lifecycle
//!
//! The process holds at most one broker credential. It arrives either from
//! configuration at startup or from a completed authorization-code login, and
//! it is dropped as soon as any downstream call made with it fails.
//!
//! State lives in one immutable [`SessionSnapshot`] that is swapped as a whole,
//! so a reader always sees a credential together with the client slot that
//! belongs to it. The client itself is built lazily, at most once per
//! credential.

use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::{self, BrokerError, FyersClient};
use crate::config::BrokerConfig;

/// Errors raised by session operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A value the operation needs is not configured
    #[error("{0}")]
    Configuration(String),

    /// The callback `state` does not belong to the pending login
    #[error("authorization state mismatch: {0}")]
    StateMismatch(String),

    /// The code exchange failed; the previous session is kept
    #[error("authorization failed: {0}")]
    Authorization(String),
}

/// A bearer token and the application it is scoped to
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    app_id: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            app_id: app_id.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("app_id", &self.app_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Where to send the user to log in, and the state that will come back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Correlation data for the one in-flight login
#[derive(Debug, Clone)]
struct PendingAuthorization {
    state: String,
    redirect_uri: String,
    created_at: DateTime<Utc>,
}

/// Credential plus the client slot built from it
#[derive(Default)]
struct SessionSnapshot {
    credential: Option<Credential>,
    client: OnceLock<Option<Arc<FyersClient>>>,
}

impl SessionSnapshot {
    fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            client: OnceLock::new(),
        }
    }
}

/// Owner of the process-wide broker session
pub struct SessionManager {
    config: BrokerConfig,
    http: Client,
    snapshot: RwLock<Arc<SessionSnapshot>>,
    pending: Mutex<Option<PendingAuthorization>>,
}

impl SessionManager {
    /// Create an empty session
    ///
    /// `http` is shared by the token exchange and every client built later,
    /// so its timeout applies to all broker traffic.
    pub fn new(config: BrokerConfig, http: Client) -> Self {
        Self {
            config,
            http,
            snapshot: RwLock::new(Arc::new(SessionSnapshot::default())),
            pending: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Install a credential supplied out of band, replacing any current one
    pub fn configure_from_token(&self, token: &str, app_id: &str) {
        self.install(Credential::new(token, app_id));
        info!("Broker session configured from provided access token");
    }

    /// Start a login: record a fresh `state` and build the provider URL
    ///
    /// A second call replaces the pending login of the first. The current
    /// credential is left alone.
    pub fn begin_authorization(&self) -> Result<AuthorizationRequest, SessionError> {
        let settings = self
            .config
            .oauth_settings()
            .map_err(SessionError::Configuration)?;

        let state = Uuid::new_v4().simple().to_string();
        let url = broker::login_url(&self.config.api_base_url, &settings, &state)
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(PendingAuthorization {
                state: state.clone(),
                redirect_uri: settings.redirect_uri.to_string(),
                created_at: Utc::now(),
            });
        if let Some(previous) = previous {
            debug!(
                "Replacing pending authorization started at {}",
                previous.created_at
            );
        }

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Finish a login by trading `auth_code` for an access token
    ///
    /// On success the new credential replaces the old one in a single swap.
    /// On any failure the current credential and client stay exactly as they
    /// were.
    pub async fn complete_authorization(
        &self,
        auth_code: &str,
        state: &str,
    ) -> Result<Credential, SessionError> {
        let settings = self
            .config
            .oauth_settings()
            .map_err(SessionError::Configuration)?;

        if self.config.verify_state {
            self.take_pending(state)?;
        }

        let token =
            broker::exchange_auth_code(&self.http, &self.config.api_base_url, &settings, auth_code)
                .await
                .map_err(|e| {
                    warn!("Authorization code exchange failed: {e}");
                    SessionError::Authorization(e.to_string())
                })?;

        let credential = Credential::new(token, settings.client_id);
        self.install(credential.clone());
        info!("Broker session established via authorization code");
        Ok(credential)
    }

    /// The client for the current credential, building it on first use
    pub fn current_client(&self) -> Option<Arc<FyersClient>> {
        let snapshot = self.snapshot();
        let credential = snapshot.credential.as_ref()?;

        snapshot
            .client
            .get_or_init(|| {
                match FyersClient::new(
                    self.http.clone(),
                    &self.config,
                    credential.app_id(),
                    credential.access_token(),
                ) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        warn!("Failed to build broker client: {e}");
                        None
                    }
                }
            })
            .clone()
    }

    /// The current credential, if any
    pub fn credential(&self) -> Option<Credential> {
        self.snapshot().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().credential.is_some()
    }

    /// Drop the credential and its client together
    pub fn invalidate(&self) {
        let previous = self.swap(SessionSnapshot::default());
        if previous.credential.is_some() {
            info!("Broker session invalidated");
        }
    }

    /// Invalidate only if `client` still belongs to the current credential
    ///
    /// A failure seen on a client that has since been replaced by a newer
    /// login says nothing about the newer credential. Returns whether the
    /// session was cleared.
    pub fn invalidate_client(&self, client: &Arc<FyersClient>) -> bool {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let current = guard
            .client
            .get()
            .and_then(|c| c.as_ref())
            .is_some_and(|c| Arc::ptr_eq(c, client));
        if current {
            *guard = Arc::new(SessionSnapshot::default());
            info!("Broker session invalidated after downstream failure");
        } else {
            debug!("Ignoring failure from a client of a replaced session");
        }
        current
    }

    /// Fetch the profile once with the current client
    ///
    /// Returns the account holder's name. A failed call or a reply whose `s`
    /// is not `ok` drops the session.
    pub async fn verify_current(&self) -> Result<String, BrokerError> {
        let Some(client) = self.current_client() else {
            self.invalidate();
            return Err(BrokerError::InvalidCredential(
                "no usable access token is installed".to_string(),
            ));
        };

        let reply = match client.profile().await {
            Ok(reply) => reply,
            Err(e) => {
                self.invalidate_client(&client);
                return Err(e);
            }
        };

        if reply.get("s").and_then(|s| s.as_str()) != Some("ok") {
            self.invalidate_client(&client);
            let message = reply
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("profile request refused");
            return Err(BrokerError::Rejected(message.to_string()));
        }

        Ok(reply
            .pointer("/data/name")
            .and_then(|n| n.as_str())
            .unwrap_or("unknown")
            .to_string())
    }

    fn take_pending(&self, state: &str) -> Result<(), SessionError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_ref() {
            Some(expected) if expected.state == state => {
                debug!(
                    "Callback matches pending authorization for {}",
                    expected.redirect_uri
                );
                *pending = None;
                Ok(())
            }
            Some(_) => Err(SessionError::StateMismatch(
                "state does not match the pending login".to_string(),
            )),
            None => Err(SessionError::StateMismatch(
                "no login is pending".to_string(),
            )),
        }
    }

    fn install(&self, credential: Credential) {
        self.swap(SessionSnapshot::with_credential(credential));
    }

    fn swap(&self, next: SessionSnapshot) -> Arc<SessionSnapshot> {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(next))
    }

    fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_config() -> BrokerConfig {
        BrokerConfig {
            client_id: Some("APP-100".to_string()),
            secret_key: Some("secret".to_string()),
            redirect_uri: Some("https://example.com/auth-callback".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = SessionManager::new(BrokerConfig::default(), Client::new());
        assert!(session.current_client().is_none());
        assert!(session.credential().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_configure_then_invalidate() {
        let session = SessionManager::new(BrokerConfig::default(), Client::new());

        session.configure_from_token("token-1", "APP-100");
        assert!(session.current_client().is_some());
        assert_eq!(
            session.credential(),
            Some(Credential::new("token-1", "APP-100"))
        );

        session.invalidate();
        assert!(session.current_client().is_none());
        assert!(session.credential().is_none());

        session.invalidate();
        assert!(session.current_client().is_none());
    }

    #[test]
    fn test_client_is_built_once_per_credential() {
        let session = SessionManager::new(BrokerConfig::default(), Client::new());
        session.configure_from_token("token-1", "APP-100");

        let first = session.current_client().unwrap();
        let second = session.current_client().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        session.configure_from_token("token-2", "APP-100");
        let third = session.current_client().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_unbuildable_client_reads_as_empty() {
        let session = SessionManager::new(BrokerConfig::default(), Client::new());
        session.configure_from_token("bad\ntoken", "APP-100");

        assert!(session.is_authenticated());
        assert!(session.current_client().is_none());
    }

    #[test]
    fn test_invalidate_client_ignores_replaced_client() {
        let session = SessionManager::new(BrokerConfig::default(), Client::new());
        session.configure_from_token("token-1", "APP-100");
        let stale = session.current_client().unwrap();

        session.configure_from_token("token-2", "APP-100");
        let fresh = session.current_client().unwrap();

        assert!(!session.invalidate_client(&stale));
        assert!(session.current_client().is_some());

        assert!(session.invalidate_client(&fresh));
        assert!(session.current_client().is_none());
    }

    #[test]
    fn test_begin_authorization_requires_configuration() {
        let session = SessionManager::new(BrokerConfig::default(), Client::new());
        let err = session.begin_authorization().unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_begin_authorization_does_not_touch_session() {
        let session = SessionManager::new(oauth_config(), Client::new());
        session.configure_from_token("token-1", "APP-100");

        let request = session.begin_authorization().unwrap();
        assert!(request.url.contains("generate-authcode"));
        assert!(request.url.contains(&format!("state={}", request.state)));
        assert!(session.current_client().is_some());
    }

    #[test]
    fn test_second_login_replaces_pending_state() {
        let session = SessionManager::new(oauth_config(), Client::new());
        let first = session.begin_authorization().unwrap();
        let second = session.begin_authorization().unwrap();
        assert_ne!(first.state, second.state);

        assert!(matches!(
            session.take_pending(&first.state),
            Err(SessionError::StateMismatch(_))
        ));
        assert!(session.take_pending(&second.state).is_ok());
        assert!(session.take_pending(&second.state).is_err());
    }

    #[tokio::test]
    async fn test_state_mismatch_keeps_session() {
        let session = SessionManager::new(oauth_config(), Client::new());
        session.configure_from_token("token-1", "APP-100");
        session.begin_authorization().unwrap();

        let err = session
            .complete_authorization("code", "forged-state")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StateMismatch(_)));
        assert_eq!(
            session.credential(),
            Some(Credential::new("token-1", "APP-100"))
        );
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let rendered = format!("{:?}", Credential::new("super-secret", "APP-100"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("APP-100"));
    }
}
