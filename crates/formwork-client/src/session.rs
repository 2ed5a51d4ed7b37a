//! Session lifecycle: login, logout, startup check, and expiry gating.
//!
//! # Design
//! - One [`SessionManager`] owns the in-memory session and the persisted token;
//!   each operation updates both under a single lock, never across an `.await`.
//! - Status starts as [`AuthStatus::Unknown`] and is settled by
//!   [`SessionManager::check_auth`], `login`, or `logout`. Any read that observes
//!   expiry moves the session to [`AuthStatus::Unauthenticated`]; there is no refresh.
//! - Expiry comes from the token's `exp` claim. The persisted expiry is only
//!   consulted for tokens that carry no decodable `exp`.
//! - Transitions are published on a `watch` channel for observers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use formwork_api_models::{FieldErrors, LoginResponse};
use parking_lot::Mutex;
use reqwest::Method;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::claims::{self, Claims};
use crate::error::{ApiError, AuthError};
use crate::http::HttpClient;
use crate::store::{PersistedToken, TokenStore};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Clock frozen at `now_ms`.
    #[must_use]
    pub const fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    /// Jump to `now_ms`.
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `step`.
    pub fn advance(&self, step: Duration) {
        let millis = i64::try_from(step.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Authentication state as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Not determined yet; startup check pending.
    Unknown,
    /// A token is present and unexpired.
    Authenticated,
    /// No usable token.
    Unauthenticated,
}

/// Result of [`SessionManager::check_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthCheck {
    /// Whether protected views may be shown.
    pub is_authenticated: bool,
    /// Whether the status is still being determined.
    pub is_loading: bool,
}

/// Active session: a bearer token and its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    expires_at_ms: i64,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

impl Session {
    /// Bearer credential.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry in epoch milliseconds.
    #[must_use]
    pub const fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at_ms)
    }

    /// Identity claims decoded from the token; `None` for opaque tokens.
    #[must_use]
    pub fn claims(&self) -> Option<Claims> {
        claims::decode_claims(&self.token)
    }

    /// Whether the session is still valid at `now_ms`.
    #[must_use]
    pub const fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }

    /// Resolve a persisted token pair into a session. `None` when the token is
    /// blank or no expiry can be determined.
    fn from_persisted(persisted: PersistedToken) -> Option<Self> {
        let token = persisted.access_token.trim().to_string();
        if token.is_empty() {
            return None;
        }
        let expires_at_ms = claims::decode_claims(&token)
            .and_then(|claims| claims.expires_at_ms())
            .or(persisted.token_expires_at)?;
        Some(Self {
            token,
            expires_at_ms,
        })
    }

    fn to_persisted(&self) -> PersistedToken {
        PersistedToken {
            access_token: self.token.clone(),
            token_expires_at: Some(self.expires_at_ms),
        }
    }
}

/// Owner of the process-wide authentication state.
pub struct SessionManager {
    http: HttpClient,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<Session>>,
    status: watch::Sender<AuthStatus>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionManager")
            .field("store", &self.store)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager in the [`AuthStatus::Unknown`] state.
    #[must_use]
    pub fn new(http: HttpClient, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        let (status, _) = watch::channel(AuthStatus::Unknown);
        Self {
            http,
            store,
            clock,
            state: Mutex::new(None),
            status,
        }
    }

    /// Current status without re-checking expiry.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    /// Observe status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    /// Determine the status from persisted storage.
    ///
    /// Missing, corrupt, or expired tokens yield an unauthenticated result;
    /// expired and corrupt entries are removed from storage.
    #[must_use = "the check result reports whether the session was restored"]
    pub fn check_auth(&self) -> AuthCheck {
        let mut state = self.state.lock();
        let now = self.clock.now_ms();

        let persisted = match self.store.load() {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(error = %err, "persisted session unreadable; treating as logged out");
                self.clear_store();
                None
            }
        };

        let had_token = persisted.is_some();
        match persisted.and_then(Session::from_persisted) {
            Some(session) if session.is_valid_at(now) => {
                debug!(expires_at_ms = session.expires_at_ms, "restored session");
                *state = Some(session);
                self.publish(AuthStatus::Authenticated);
            }
            Some(_) => {
                info!("persisted session expired");
                self.clear_store();
                *state = None;
                self.publish(AuthStatus::Unauthenticated);
            }
            None => {
                if had_token {
                    info!("persisted token has no usable expiry");
                    self.clear_store();
                }
                *state = None;
                self.publish(AuthStatus::Unauthenticated);
            }
        }

        AuthCheck {
            is_authenticated: state.is_some(),
            is_loading: false,
        }
    }

    /// Authenticate with the backend and persist the issued token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] when the backend answers 401
    /// - [`AuthError::InvalidInput`] for blank input or a 422 answer
    /// - [`AuthError::LoginFailed`] for anything else
    ///
    /// Nothing is stored on failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        let mut field_errors = FieldErrors::new();
        if email.is_empty() {
            field_errors
                .entry("username".to_string())
                .or_default()
                .push("email is required".to_string());
        }
        if password.is_empty() {
            field_errors
                .entry("password".to_string())
                .or_default()
                .push("password is required".to_string());
        }
        if !field_errors.is_empty() {
            return Err(AuthError::InvalidInput {
                message: "email and password are required".to_string(),
                field_errors,
            });
        }

        let url = self.http.endpoint("api/auth/login")?;
        let request = self
            .http
            .request(Method::POST, url, None)
            .form(&[("username", email), ("password", password)]);
        let response: LoginResponse = self.http.send_json(request).await.map_err(|err| {
            info!(error = %err, "login rejected");
            AuthError::from(err)
        })?;

        let issued_at = self.clock.now_ms();
        let token = response.access_token.trim().to_string();
        let expires_at_ms = claims::decode_claims(&token)
            .and_then(|claims| claims.expires_at_ms())
            .or_else(|| {
                response.expires_in.map(|secs| {
                    issued_at.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1_000))
                })
            });
        let Some(expires_at_ms) = expires_at_ms.filter(|_| !token.is_empty()) else {
            return Err(AuthError::LoginFailed {
                status: Some(200),
                message: "backend issued a token without an expiry".to_string(),
            });
        };

        let session = Session {
            token,
            expires_at_ms,
        };
        if !session.is_valid_at(issued_at) {
            return Err(AuthError::LoginFailed {
                status: Some(200),
                message: "backend issued an already expired token".to_string(),
            });
        }

        let mut state = self.state.lock();
        self.store
            .save(&session.to_persisted())
            .map_err(|err| AuthError::LoginFailed {
                status: None,
                message: format!("failed to persist session: {err}"),
            })?;
        *state = Some(session.clone());
        self.publish(AuthStatus::Authenticated);
        drop(state);

        info!(expires_at_ms = session.expires_at_ms, "logged in");
        Ok(session)
    }

    /// Clear the session locally, then notify the backend on a best-effort basis.
    ///
    /// Local state is cleared before the network call, so the client is logged
    /// out even when the call fails or this future is dropped.
    pub async fn logout(&self) {
        let token = {
            let mut state = self.state.lock();
            // Before the first check the token only lives in storage.
            let token = match state.take() {
                Some(session) => Some(session.token),
                None if self.status() == AuthStatus::Unknown => self
                    .store
                    .load()
                    .ok()
                    .flatten()
                    .and_then(Session::from_persisted)
                    .filter(|session| session.is_valid_at(self.clock.now_ms()))
                    .map(|session| session.token),
                None => None,
            };
            self.clear_store();
            self.publish(AuthStatus::Unauthenticated);
            token
        };
        info!("logged out locally");

        let Some(token) = token else {
            return;
        };
        let url = match self.http.endpoint("api/auth/logout") {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "skipping backend logout");
                return;
            }
        };
        if let Err(err) = self
            .http
            .send(self.http.request(Method::POST, url, Some(&token)))
            .await
        {
            warn!(error = %err, "backend logout failed; local session already cleared");
        }
    }

    /// Drop the session after the backend rejected its token on a protected call.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        if state.take().is_some() {
            info!("backend rejected session token");
        }
        self.clear_store();
        self.publish(AuthStatus::Unauthenticated);
    }

    /// Whether a valid session exists right now. Observing expiry clears it.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Current valid session, if any. Observing expiry clears it.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.current()
    }

    /// Bearer token for protected calls.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] when there is no valid session.
    pub fn bearer(&self) -> Result<String, ApiError> {
        self.current()
            .map(|session| session.token)
            .ok_or(ApiError::Unauthenticated)
    }

    /// Claims of the current token, if it decodes.
    #[must_use]
    pub fn decode_claims(&self) -> Option<Claims> {
        self.current().as_ref().and_then(Session::claims)
    }

    /// Whole seconds until the current token's `exp` claim, clamped at zero.
    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.current().map_or(0, |session| {
            claims::remaining_seconds(&session.token, self.clock.now_ms())
        })
    }

    fn current(&self) -> Option<Session> {
        if self.status() == AuthStatus::Unknown {
            let _ = self.check_auth();
        }
        let mut state = self.state.lock();
        let now = self.clock.now_ms();
        match state.as_ref() {
            Some(session) if session.is_valid_at(now) => Some(session.clone()),
            Some(_) => {
                info!("session expired");
                *state = None;
                self.clear_store();
                self.publish(AuthStatus::Unauthenticated);
                None
            }
            None => None,
        }
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear persisted session");
        }
    }

    fn publish(&self, next: AuthStatus) {
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
