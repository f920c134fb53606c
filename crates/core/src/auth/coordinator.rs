//! Authentication coordinator
//!
//! Owns the current [`AuthState`] and everything that mutates it:
//! - Restores persisted credentials once (`initialize`)
//! - Refreshes proactively on a timer and reactively on 401, through one
//!   single-flight entry point throttled by a cool-down window
//! - Collapses concurrent logins into one credential exchange
//! - Falls back to legacy identity-header mode when the backend cannot issue
//!   tokens
//!
//! Every mutation is persisted through the [`StateStore`]. A refresh the
//! server rejects clears the credential entirely; a refresh that never reached
//! the server (offline, connect failure, timeout) leaves it in place.

use std::sync::Arc;
use std::time::Duration;

use courier_common::resilience::{Clock, SystemClock};
use courier_common::sync::{Cooldown, SingleFlight};
use courier_domain::constants::{
    AUTH_STATE_KEYS, CONTENT_TYPE_JSON, HEADER_AUTHORIZATION, HEADER_CLIENT_VERSION,
    HEADER_CONTENT_TYPE, HEADER_REQUEST_ID, KEY_ACCESS_TOKEN, KEY_AUTH_MODE, KEY_CACHE_SNAPSHOT,
    KEY_DEVICE_ID, KEY_EXPIRES_AT, KEY_REFRESH_TOKEN, KEY_USER_INFO, PATH_AUTH_LOGIN,
    PATH_AUTH_REFRESH, PATH_AUTH_USERINFO,
};
use courier_domain::{
    AuthConfig, AuthMode, AuthState, Config, CourierError, ErrorKind, Method, Result, TokenGrant,
    UserInfo,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ports::CredentialSource;
use crate::network::NetworkMonitor;
use crate::storage::ports::StateStore;
use crate::transport::ports::{HttpRequest, HttpResponse, Transport};
use crate::transport::{classify_response, resolve_url};

const EVENT_CAPACITY: usize = 32;

/// Credential lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    LoggedIn(UserInfo),
    Refreshed { expires_at_ms: Option<i64> },
    LoggedOut { reason: String },
    /// Backend cannot issue tokens; requests carry an identity header instead
    LegacyMode(UserInfo),
}

/// Builder for [`AuthCoordinator`]
pub struct AuthCoordinatorBuilder {
    transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
    base_url: String,
    client_version: String,
    timeout: Duration,
    monitor: Option<NetworkMonitor>,
}

impl AuthCoordinatorBuilder {
    fn new(transport: Arc<dyn Transport>, store: Arc<dyn StateStore>) -> Self {
        let defaults = Config::default();
        let timeout = defaults.api.timeout();
        Self {
            transport,
            store,
            clock: Arc::new(SystemClock),
            config: defaults.auth,
            base_url: defaults.api.base_url,
            client_version: defaults.api.client_version,
            timeout,
            monitor: None,
        }
    }

    /// Take auth settings, base URL, client version and timeout from `config`
    pub fn config(mut self, config: &Config) -> Self {
        self.config = config.auth.clone();
        self.base_url = config.api.base_url.clone();
        self.client_version = config.api.client_version.clone();
        self.timeout = config.api.timeout();
        self
    }

    pub fn auth_config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defer refreshes while `monitor` reports offline
    pub fn monitor(mut self, monitor: NetworkMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn build(self) -> AuthCoordinator {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let refresh_cooldown =
            Cooldown::with_clock(self.config.refresh_cooldown(), Arc::clone(&self.clock));
        let login_cooldown =
            Cooldown::with_clock(self.config.login_cooldown(), Arc::clone(&self.clock));
        AuthCoordinator {
            inner: Arc::new(AuthInner {
                transport: self.transport,
                store: self.store,
                clock: self.clock,
                config: self.config,
                base_url: self.base_url,
                client_version: self.client_version,
                timeout: self.timeout,
                monitor: self.monitor,
                state: Mutex::new(None),
                mode: Mutex::new(AuthMode::Token),
                device_id: Mutex::new(None),
                refresh_flight: SingleFlight::new("auth.refresh"),
                login_flight: SingleFlight::new("auth.login"),
                refresh_cooldown,
                login_cooldown,
                events,
                initialized: OnceCell::new(),
                auto_refresh: Mutex::new(None),
            }),
        }
    }
}

struct AuthInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
    base_url: String,
    client_version: String,
    timeout: Duration,
    monitor: Option<NetworkMonitor>,
    state: Mutex<Option<AuthState>>,
    mode: Mutex<AuthMode>,
    device_id: Mutex<Option<String>>,
    refresh_flight: SingleFlight<(), CourierError>,
    login_flight: SingleFlight<UserInfo, CourierError>,
    refresh_cooldown: Cooldown<Arc<dyn Clock>>,
    login_cooldown: Cooldown<Arc<dyn Clock>>,
    events: broadcast::Sender<AuthEvent>,
    initialized: OnceCell<()>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to the authentication state; clones observe the same state
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<AuthInner>,
}

impl AuthCoordinator {
    pub fn builder(
        transport: Arc<dyn Transport>,
        store: Arc<dyn StateStore>,
    ) -> AuthCoordinatorBuilder {
        AuthCoordinatorBuilder::new(transport, store)
    }

    /// Restore persisted credentials; runs once, concurrent callers wait for it
    pub async fn initialize(&self) -> Result<()> {
        self.inner.initialized.get_or_try_init(|| self.restore()).await.map(|_| ())
    }

    pub fn mode(&self) -> AuthMode {
        *self.inner.mode.lock()
    }

    /// Snapshot of the current credential
    pub fn state(&self) -> Option<AuthState> {
        self.inner.state.lock().clone()
    }

    pub fn current_user(&self) -> Option<UserInfo> {
        self.inner.state.lock().as_ref().and_then(|state| state.user_info.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        let mode = self.mode();
        let state = self.inner.state.lock();
        match mode {
            AuthMode::Legacy => state.as_ref().is_some_and(|s| s.user_info.is_some()),
            AuthMode::Token => state.as_ref().is_some_and(AuthState::has_token),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Headers to attach to an outgoing request
    ///
    /// `Authorization: Bearer <token>` in token mode, the configured identity
    /// header in legacy mode, nothing when logged out.
    pub async fn get_auth_headers(&self) -> Result<Vec<(String, String)>> {
        self.initialize().await?;

        if self.mode() == AuthMode::Legacy {
            let identity = match self.current_user() {
                Some(user) => user.user_id,
                None => self.device_id().await?,
            };
            return Ok(vec![(self.inner.config.legacy_identity_header.clone(), identity)]);
        }

        Ok(self
            .access_token()
            .map(|token| vec![(HEADER_AUTHORIZATION.to_string(), format!("Bearer {token}"))])
            .unwrap_or_default())
    }

    /// Make sure the access token is usable, refreshing it if it expires soon
    ///
    /// Always true in legacy mode; false when logged out or the refresh fails.
    pub async fn ensure_fresh_token(&self) -> bool {
        if let Err(e) = self.initialize().await {
            warn!(error = %e, "failed to restore auth state");
            return false;
        }
        if self.mode() == AuthMode::Legacy {
            return true;
        }

        let Some(state) = self.state().filter(AuthState::has_token) else {
            return false;
        };
        if !state.expires_within(self.inner.clock.unix_millis(), self.refresh_window_ms()) {
            return true;
        }
        self.refresh().await.is_ok()
    }

    /// Refresh the access token
    ///
    /// Concurrent callers share one in-flight refresh. Inside the cool-down
    /// after a successful refresh no network call is made. When the server
    /// rejects the refresh the credential is cleared and every waiting caller
    /// receives the error. While offline, or when the call never gets a
    /// response, the credential is kept and a `Network`/`Timeout` error is
    /// returned instead.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        if self.mode() == AuthMode::Legacy {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        self.inner
            .refresh_flight
            .run(move || async move { AuthCoordinator { inner }.perform_refresh().await })
            .await
    }

    /// Exchange a credential from `source` for a session
    ///
    /// Concurrent calls collapse into one exchange; calls inside the login
    /// cool-down return the last known identity without calling `source`.
    #[instrument(skip(self, source))]
    pub async fn login(&self, source: Arc<dyn CredentialSource>) -> Result<UserInfo> {
        self.initialize().await?;

        if self.inner.login_cooldown.is_active() {
            if let Some(user) = self.current_user() {
                debug!(user_id = %user.user_id, "login inside cool-down; reusing identity");
                return Ok(user);
            }
        }

        let inner = Arc::clone(&self.inner);
        self.inner
            .login_flight
            .run(move || async move { AuthCoordinator { inner }.perform_login(source).await })
            .await
    }

    /// Confirm the restored token with `GET /auth/userinfo`
    ///
    /// A rejected token gets one refresh and a second lookup.
    #[instrument(skip(self))]
    pub async fn validate(&self) -> Result<UserInfo> {
        self.initialize().await?;

        if self.mode() == AuthMode::Legacy {
            return self.current_user().ok_or_else(|| CourierError::auth("no legacy identity"));
        }

        let token = self.access_token().ok_or_else(|| CourierError::auth("not authenticated"))?;
        let user = match self.fetch_user_info(&token).await {
            Ok(user) => user,
            Err(e) if e.kind() == ErrorKind::Auth => {
                debug!("stored token rejected; refreshing before second lookup");
                self.refresh().await?;
                let token =
                    self.access_token().ok_or_else(|| CourierError::auth("not authenticated"))?;
                self.fetch_user_info(&token).await?
            }
            Err(e) => return Err(e),
        };

        let updated = {
            let mut state = self.inner.state.lock();
            state.as_mut().map(|state| {
                state.user_info = Some(user.clone());
                state.clone()
            })
        };
        if let Some(state) = updated {
            self.persist(&state, AuthMode::Token).await?;
        }
        Ok(user)
    }

    /// Clear the session and its persisted keys in one store operation
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let mut keys = AUTH_STATE_KEYS.to_vec();
        keys.push(KEY_CACHE_SNAPSHOT);
        self.clear_session(&keys, "logout").await?;
        info!("logged out");
        Ok(())
    }

    /// Start the proactive refresh timer (no-op if already running)
    pub fn start_auto_refresh(&self) {
        let mut slot = self.inner.auto_refresh.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.config.check_interval();
        info!(interval_secs = interval.as_secs(), "starting token auto-refresh");
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = weak.upgrade() else { break };
                let coordinator = AuthCoordinator { inner };
                if coordinator.is_offline() {
                    debug!("offline; skipping proactive refresh check");
                    continue;
                }
                if coordinator.needs_proactive_refresh() {
                    info!("token expiring soon; refreshing proactively");
                    if let Err(e) = coordinator.refresh().await {
                        error!(error = %e, "proactive refresh failed");
                    }
                }
            }
        }));
    }

    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self.inner.auto_refresh.lock().take() {
            handle.abort();
        }
    }

    fn needs_proactive_refresh(&self) -> bool {
        if self.mode() == AuthMode::Legacy {
            return false;
        }
        let now = self.inner.clock.unix_millis();
        self.inner.state.lock().as_ref().is_some_and(|state| {
            state.has_token() && state.expires_within(now, self.refresh_window_ms())
        })
    }

    fn is_offline(&self) -> bool {
        self.inner.monitor.as_ref().is_some_and(|monitor| !monitor.is_online())
    }

    fn refresh_window_ms(&self) -> i64 {
        i64::try_from(self.inner.config.refresh_window().as_millis()).unwrap_or(i64::MAX)
    }

    fn access_token(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .as_ref()
            .and_then(|state| state.access_token.clone())
            .filter(|token| !token.is_empty())
    }

    async fn perform_refresh(&self) -> Result<()> {
        self.initialize().await?;

        let current = self.state();
        if self.inner.refresh_cooldown.is_active()
            && current.as_ref().is_some_and(AuthState::has_token)
        {
            debug!("refresh inside cool-down; token is already fresh");
            return Ok(());
        }

        let Some(current) = current else {
            return Err(CourierError::auth("not authenticated"));
        };
        let Some(refresh_token) = current.refresh_token.clone() else {
            return Err(self.fail_refresh("no refresh token available").await);
        };

        if self.is_offline() {
            debug!("offline; deferring token refresh");
            return Err(CourierError::network("offline; token refresh deferred"));
        }

        info!("refreshing access token");
        let response = match self
            .call(Method::Post, PATH_AUTH_REFRESH, Some(json!({ "refreshToken": refresh_token })), None)
            .await
        {
            Ok(response) => response,
            Err(e) if matches!(e.kind(), ErrorKind::Network | ErrorKind::Timeout) => {
                warn!(error = %e, "refresh endpoint unreachable; keeping credentials");
                return Err(e);
            }
            Err(e) => return Err(self.fail_refresh(e.summary()).await),
        };
        let outcome = classify_response(&response).and_then(parse_grant);

        match outcome {
            Ok(grant) if grant.token.as_deref().is_some_and(|token| !token.is_empty()) => {
                let next = current.rotate(grant, self.inner.clock.unix_millis());
                let expires_at_ms = next.expires_at_ms;
                *self.inner.state.lock() = Some(next.clone());
                self.inner.refresh_cooldown.mark();
                if let Err(e) = self.persist(&next, AuthMode::Token).await {
                    warn!(error = %e, "failed to persist refreshed credentials");
                }
                let _ = self.inner.events.send(AuthEvent::Refreshed { expires_at_ms });
                info!(expires_at_ms, "access token refreshed");
                Ok(())
            }
            Ok(_) => Err(self.fail_refresh("refresh response carried no token").await),
            Err(e) => Err(self.fail_refresh(e.summary()).await),
        }
    }

    /// Terminal refresh failure: drop the credential, never retry
    async fn fail_refresh(&self, reason: &str) -> CourierError {
        error!(reason, "token refresh failed; clearing credentials");
        if let Err(e) = self.clear_session(&AUTH_STATE_KEYS, reason).await {
            warn!(error = %e, "failed to remove persisted credentials");
        }
        CourierError::auth(format!("token refresh failed: {reason}"))
    }

    async fn perform_login(&self, source: Arc<dyn CredentialSource>) -> Result<UserInfo> {
        let credential = source.obtain().await?;
        info!("exchanging login credential");

        let body = json!({ "code": credential.code, "profile": credential.profile });
        let response = self.call(Method::Post, PATH_AUTH_LOGIN, Some(body), None).await?;
        if matches!(response.status, 404 | 501) {
            warn!(status = response.status, "backend does not issue tokens; using legacy mode");
            return self.enter_legacy(None).await;
        }

        let grant = classify_response(&response).and_then(parse_grant)?;
        if !grant.token.as_deref().is_some_and(|token| !token.is_empty()) {
            warn!("login response carried no token; using legacy mode");
            return self.enter_legacy(grant.user_info).await;
        }

        let mut state = AuthState::from_grant(grant, self.inner.clock.unix_millis());
        let user = match state.user_info.clone() {
            Some(user) => user,
            None => {
                let token = state.access_token.clone().unwrap_or_default();
                let user = self.fetch_user_info(&token).await?;
                state.user_info = Some(user.clone());
                user
            }
        };

        self.persist(&state, AuthMode::Token).await?;
        *self.inner.mode.lock() = AuthMode::Token;
        *self.inner.state.lock() = Some(state);
        self.inner.refresh_cooldown.reset();
        self.inner.login_cooldown.mark();
        let _ = self.inner.events.send(AuthEvent::LoggedIn(user.clone()));
        info!(user_id = %user.user_id, "logged in");
        Ok(user)
    }

    async fn enter_legacy(&self, user: Option<UserInfo>) -> Result<UserInfo> {
        let user = match user {
            Some(user) => user,
            None => UserInfo::new(self.device_id().await?),
        };
        let state = AuthState { user_info: Some(user.clone()), ..AuthState::default() };

        self.persist(&state, AuthMode::Legacy).await?;
        *self.inner.mode.lock() = AuthMode::Legacy;
        *self.inner.state.lock() = Some(state);
        self.inner.login_cooldown.mark();
        let _ = self.inner.events.send(AuthEvent::LegacyMode(user.clone()));
        info!(user_id = %user.user_id, "authenticated in legacy identity mode");
        Ok(user)
    }

    async fn fetch_user_info(&self, token: &str) -> Result<UserInfo> {
        let response =
            self.call(Method::Get, PATH_AUTH_USERINFO, None, Some(token.to_string())).await?;
        let payload = classify_response(&response)?;
        serde_json::from_value(payload)
            .map_err(|e| CourierError::Internal(format!("malformed user info: {e}")))
    }

    /// Stable per-installation identifier for legacy mode
    async fn device_id(&self) -> Result<String> {
        if let Some(id) = self.inner.device_id.lock().clone() {
            return Ok(id);
        }
        let candidate = Uuid::new_v4().to_string();
        let id = self.inner.device_id.lock().get_or_insert(candidate).clone();
        self.inner.store.set(KEY_DEVICE_ID, &id).await?;
        Ok(id)
    }

    async fn clear_session(&self, keys: &[&str], reason: &str) -> Result<()> {
        *self.inner.state.lock() = None;
        *self.inner.mode.lock() = AuthMode::Token;
        self.inner.refresh_cooldown.reset();
        self.inner.login_cooldown.reset();
        let _ = self.inner.events.send(AuthEvent::LoggedOut { reason: reason.to_string() });
        self.inner.store.remove_many(keys).await
    }

    async fn restore(&self) -> Result<()> {
        let store = &self.inner.store;
        let mode = store
            .get(KEY_AUTH_MODE)
            .await?
            .and_then(|raw| raw.parse::<AuthMode>().ok())
            .unwrap_or_default();
        let user_info = match store.get(KEY_USER_INFO).await? {
            Some(raw) => match serde_json::from_str::<UserInfo>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable persisted user info");
                    None
                }
            },
            None => None,
        };
        let restored = AuthState {
            access_token: store.get(KEY_ACCESS_TOKEN).await?,
            refresh_token: store.get(KEY_REFRESH_TOKEN).await?,
            expires_at_ms: store.get(KEY_EXPIRES_AT).await?.and_then(|raw| raw.parse().ok()),
            user_info,
        };
        let device_id = store.get(KEY_DEVICE_ID).await?;

        let authenticated = restored.has_token();
        let has_identity = authenticated || restored.user_info.is_some();
        *self.inner.mode.lock() = mode;
        *self.inner.device_id.lock() = device_id;
        if has_identity {
            *self.inner.state.lock() = Some(restored);
        }
        info!(%mode, authenticated, "auth state restored");
        Ok(())
    }

    async fn persist(&self, state: &AuthState, mode: AuthMode) -> Result<()> {
        let store = self.inner.store.as_ref();
        let expires_at = state.expires_at_ms.map(|ms| ms.to_string());
        let user_info = state
            .user_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CourierError::Internal(format!("failed to encode user info: {e}")))?;

        set_or_remove(store, KEY_ACCESS_TOKEN, state.access_token.as_deref()).await?;
        set_or_remove(store, KEY_REFRESH_TOKEN, state.refresh_token.as_deref()).await?;
        set_or_remove(store, KEY_EXPIRES_AT, expires_at.as_deref()).await?;
        set_or_remove(store, KEY_USER_INFO, user_info.as_deref()).await?;
        store.set(KEY_AUTH_MODE, &mode.to_string()).await
    }

    /// Send one request on the coordinator's own behalf, outside the client
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bearer: Option<String>,
    ) -> Result<HttpResponse> {
        let url = resolve_url(&self.inner.base_url, path);
        let mut request = HttpRequest::new(method, url, self.inner.timeout)
            .header(HEADER_REQUEST_ID, Uuid::new_v4().to_string())
            .header(HEADER_CLIENT_VERSION, &self.inner.client_version);
        if let Some(token) = bearer {
            request = request.header(HEADER_AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.header(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON).json(&body)?;
        }

        match tokio::time::timeout(self.inner.timeout, self.inner.transport.send(request)).await {
            Ok(result) => result.map_err(CourierError::from),
            Err(_) => Err(CourierError::timeout(format!("{path} timed out"))),
        }
    }
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("mode", &self.mode())
            .field("authenticated", &self.is_authenticated())
            .field("refresh_in_flight", &self.inner.refresh_flight.is_in_flight())
            .finish_non_exhaustive()
    }
}

fn parse_grant(payload: Value) -> Result<TokenGrant> {
    serde_json::from_value(payload)
        .map_err(|e| CourierError::Internal(format!("malformed token grant: {e}")))
}

async fn set_or_remove(store: &dyn StateStore, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => store.set(key, value).await,
        None => store.remove(key).await,
    }
}
