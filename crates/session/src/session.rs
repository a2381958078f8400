//! Session handle: credential ownership, request dispatch, login/logout
//!
//! `Session` is a cheap `Clone` handle over shared state. Feature code
//! receives one explicitly; there is no global session.
//!
//! Shared state and its guards:
//! - `refresh: Mutex<RefreshState>` serializes the `Idle -> Refreshing -> Idle`
//!   transition and every replacement of the credential pair
//! - `credentials: RwLock<Credentials>` is read on every request
//!
//! Lock order is always `refresh` then `credentials`.

use std::sync::Arc;

use common::Secret;
use lesson_auth::{
    ACCESS_TOKEN_KEY, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REFRESH_PATH, REFRESH_TOKEN_KEY,
    SESSION_KEYS, TokenPair, TokenStore, USER_KEY, UserProfile,
};
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, instrument, warn};
use transport::{HttpCall, HttpResponse, Transport};

use crate::error::{Result, SessionError};
use crate::events::{EndReason, SessionEvent};
use crate::refresh::{RefreshPhase, RefreshState};
use crate::request::RequestSpec;

/// Header carrying the per-request correlation ID.
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Capacity of the event channel; slow observers skip old events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Base URL and auth endpoint paths.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub me_path: String,
}

impl SessionConfig {
    /// Config with the platform's default auth paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: LOGIN_PATH.to_string(),
            refresh_path: REFRESH_PATH.to_string(),
            logout_path: LOGOUT_PATH.to_string(),
            me_path: ME_PATH.to_string(),
        }
    }

    /// Resolve an API path against the base URL.
    pub fn url(&self, path: &str) -> Result<String> {
        if !path.starts_with('/') {
            return Err(SessionError::InvalidRequest(format!(
                "path must start with '/', got: {path}"
            )));
        }
        Ok(format!("{}{}", self.base_url.trim_end_matches('/'), path))
    }
}

/// Access and refresh token, owned by the session.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access: Secret<String>,
    pub refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }
}

impl From<TokenPair> for CredentialPair {
    fn from(pair: TokenPair) -> Self {
        Self::new(pair.access_token, pair.refresh_token)
    }
}

/// Current pair plus a generation bumped on every login and logout.
///
/// A refresh cycle remembers the generation it started in; if it changed by
/// the time the cycle finishes, the cycle's result belongs to a session that
/// no longer exists and is discarded.
#[derive(Debug, Default)]
pub(crate) struct Credentials {
    pub(crate) pair: Option<CredentialPair>,
    pub(crate) generation: u64,
}

pub(crate) struct Inner {
    pub(crate) config: SessionConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn TokenStore>,
    pub(crate) credentials: RwLock<Credentials>,
    pub(crate) refresh: Mutex<RefreshState>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

/// Authenticated API session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<Inner>,
}

impl Session {
    /// Create a session, restoring a credential pair persisted in `store`.
    ///
    /// A store holding only one of the two tokens is treated as signed out.
    pub async fn open(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let access = store.get(ACCESS_TOKEN_KEY).await;
        let refresh = store.get(REFRESH_TOKEN_KEY).await;
        let pair = match (access, refresh) {
            (Some(access), Some(refresh)) => {
                info!(transport = transport.id(), "restored session from token store");
                Some(CredentialPair::new(access, refresh))
            }
            (None, None) => None,
            _ => {
                warn!("token store holds an incomplete credential pair, starting signed out");
                None
            }
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                store,
                credentials: RwLock::new(Credentials {
                    pair,
                    generation: 0,
                }),
                refresh: Mutex::new(RefreshState::Idle),
                events,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the current credential pair.
    pub async fn credentials(&self) -> Option<CredentialPair> {
        self.inner.credentials.read().await.pair.clone()
    }

    /// Route guard: whether a credential pair is held.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.credentials.read().await.pair.is_some()
    }

    /// Route guard for callers that need a session to proceed.
    pub async fn require_auth(&self) -> Result<()> {
        if self.is_authenticated().await {
            Ok(())
        } else {
            Err(SessionError::ReauthRequired)
        }
    }

    /// Profile cached at login, if any.
    pub async fn current_user(&self) -> Option<UserProfile> {
        let raw = self.inner.store.get(USER_KEY).await?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "cached user profile is unreadable, ignoring it");
                None
            }
        }
    }

    /// Current phase of the refresh protocol.
    pub async fn refresh_phase(&self) -> RefreshPhase {
        self.inner.refresh.lock().await.phase()
    }

    /// Send an API request with the session's credentials.
    ///
    /// Non-401 responses are returned unchanged, whatever their status. A 401
    /// enrolls the request in the refresh protocol and retries it once with
    /// the renewed access token.
    pub async fn send(&self, spec: RequestSpec) -> Result<HttpResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let result = self.dispatch(spec, request_id).await;
        crate::metrics::record_request(match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        });
        result
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %spec.method, path = %spec.path))]
    async fn dispatch(&self, spec: RequestSpec, request_id: String) -> Result<HttpResponse> {
        let url = self.inner.config.url(&spec.path)?;
        let token = self.credentials().await.map(|pair| pair.access);

        let response = self.issue(&spec, &url, token.as_ref(), &request_id).await?;
        if !response.is_unauthorized() {
            debug!(status = response.status, "request completed");
            return Ok(response);
        }

        debug!("access token rejected, waiting for renewed credentials");
        let fresh = self.await_fresh_token(token.as_ref()).await?;

        let retried = self.issue(&spec, &url, Some(&fresh), &request_id).await?;
        if retried.is_unauthorized() {
            warn!("request rejected again after token refresh");
            return Err(SessionError::Unauthorized);
        }
        debug!(status = retried.status, "retried request completed");
        Ok(retried)
    }

    /// Issue one attempt with the given bearer token.
    async fn issue(
        &self,
        spec: &RequestSpec,
        url: &str,
        token: Option<&Secret<String>>,
        request_id: &str,
    ) -> Result<HttpResponse> {
        let mut headers = spec.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            transport::set_bearer(&mut headers, token.expose()).map_err(|e| {
                SessionError::InvalidRequest(format!("access token is not a valid header: {e}"))
            })?;
        }
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }

        let call = HttpCall {
            method: spec.method.clone(),
            url: url.to_string(),
            headers,
            body: spec.body.clone(),
        };

        self.inner.transport.execute(call).await.map_err(|e| {
            warn!(error = %e, kind = e.kind(), "transport failure");
            SessionError::NetworkFailure(e.to_string())
        })
    }

    /// Sign in with email and password.
    ///
    /// Stores the returned pair, then loads and caches the user profile. A
    /// rejected login is `Unauthorized` and never starts a refresh cycle. If
    /// the profile cannot be loaded the new session is discarded.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let url = self.inner.config.url(&self.inner.config.login_path)?;
        let pair = lesson_auth::login(self.inner.transport.as_ref(), &url, email, password)
            .await
            .map_err(|e| {
                warn!(error = %e, "login failed");
                SessionError::from(e)
            })?;

        self.install(CredentialPair::from(pair)).await;

        let profile = match self.fetch_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "signed in but profile could not be loaded, discarding session");
                self.clear_local().await;
                return Err(e);
            }
        };
        self.cache_profile(&profile).await;

        info!(user_id = profile.id, username = %profile.username, "signed in");
        let _ = self.inner.events.send(SessionEvent::SignedIn {
            username: profile.username.clone(),
        });
        Ok(profile)
    }

    /// Sign out.
    ///
    /// Clears the pair and cached profile, then asks the API to revoke the
    /// refresh token. Revocation is best-effort: failures are only logged.
    pub async fn logout(&self) {
        let Some(pair) = self.clear_local().await else {
            debug!("logout without a session, nothing to do");
            return;
        };

        match self.inner.config.url(&self.inner.config.logout_path) {
            Ok(url) => {
                if let Err(e) = lesson_auth::revoke(
                    self.inner.transport.as_ref(),
                    &url,
                    Some(pair.access.expose()),
                    pair.refresh.expose(),
                )
                .await
                {
                    warn!(error = %e, "refresh token revocation failed");
                }
            }
            Err(e) => warn!(error = %e, "logout path is invalid, skipping revocation"),
        }

        info!("signed out");
        crate::metrics::record_session_ended(EndReason::LoggedOut.label());
        let _ = self.inner.events.send(SessionEvent::Ended {
            reason: EndReason::LoggedOut,
        });
    }

    /// Check a restored session against the API.
    ///
    /// With a pair and a cached profile, fetches the current profile; any
    /// failure signs out. Returns the profile when the session is usable.
    pub async fn validate(&self) -> Option<UserProfile> {
        if !self.is_authenticated().await || self.current_user().await.is_none() {
            return None;
        }

        match self.fetch_profile().await {
            Ok(profile) => {
                self.cache_profile(&profile).await;
                Some(profile)
            }
            Err(e) => {
                warn!(error = %e, "stored session is no longer valid, signing out");
                self.logout().await;
                None
            }
        }
    }

    /// Load the signed-in user's profile through the normal request path.
    async fn fetch_profile(&self) -> Result<UserProfile> {
        let response = self
            .send(RequestSpec::get(self.inner.config.me_path.clone()))
            .await?;
        if !response.is_success() {
            return Err(SessionError::Protocol(format!(
                "profile request returned {}: {}",
                response.status,
                response.text()
            )));
        }
        response
            .json()
            .map_err(|e| SessionError::Protocol(format!("invalid profile response: {e}")))
    }

    async fn cache_profile(&self, profile: &UserProfile) {
        match serde_json::to_string(profile) {
            Ok(json) => {
                if let Err(e) = self.inner.store.set(USER_KEY, json).await {
                    warn!(error = %e, "failed to persist user profile");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode user profile"),
        }
    }

    /// Replace the pair with a freshly issued one (login).
    async fn install(&self, pair: CredentialPair) {
        let _state = self.inner.refresh.lock().await;
        let changes = vec![
            (ACCESS_TOKEN_KEY.to_string(), Some(pair.access.expose().clone())),
            (REFRESH_TOKEN_KEY.to_string(), Some(pair.refresh.expose().clone())),
            (USER_KEY.to_string(), None),
        ];
        if let Err(e) = self.inner.store.update(changes).await {
            warn!(error = %e, "failed to persist credentials");
        }
        let mut credentials = self.inner.credentials.write().await;
        credentials.pair = Some(pair);
        credentials.generation += 1;
    }

    /// Drop the pair and cached profile; returns the pair that was held.
    async fn clear_local(&self) -> Option<CredentialPair> {
        let _state = self.inner.refresh.lock().await;
        let previous = {
            let mut credentials = self.inner.credentials.write().await;
            credentials.generation += 1;
            credentials.pair.take()
        };
        self.inner.remove_persisted().await;
        previous
    }
}

impl Inner {
    /// Remove every session key from the token store.
    pub(crate) async fn remove_persisted(&self) {
        let changes = SESSION_KEYS.iter().map(|k| (k.to_string(), None)).collect();
        if let Err(e) = self.store.update(changes).await {
            warn!(error = %e, "failed to clear persisted credentials");
        }
    }
}
