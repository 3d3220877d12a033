//! Session state and the token source capability
//!
//! The client never owns credentials. It reads them from a [`TokenSource`]
//! before every attempt and, after a successful refresh, hands the new
//! [`Session`] back for persistence.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Authenticated session issued at login or by a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent with every request
    pub access_token: String,
    /// Token exchanged at `/auth/refresh` for a new session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Session {
    /// Session with only an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Builder-style method to set the refresh token
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Builder-style method to set the expiry timestamp
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the session has expired at `now` (seconds since epoch)
    ///
    /// Sessions without an expiry never expire locally; the backend decides.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the session has expired according to the system clock
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// Where the client gets its credentials from
///
/// Implementations must be cheap to call; the client reads the token before
/// every attempt.
pub trait TokenSource: Send + Sync {
    /// Current session, if signed in
    fn session(&self) -> Option<Session>;

    /// Persist a session produced by a refresh
    fn set_session(&self, session: Session);

    /// Tear down the session everywhere (global sign-out)
    fn logout(&self);

    /// Current access token; empty tokens count as absent
    fn get_token(&self) -> Option<String> {
        self.session()
            .map(|s| s.access_token)
            .filter(|t| !t.is_empty())
    }
}

/// In-process session store
#[derive(Debug, Default)]
pub struct MemoryTokenSource {
    session: RwLock<Option<Session>>,
    logouts: AtomicU64,
}

impl MemoryTokenSource {
    /// Signed-out store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding an existing session
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            logouts: AtomicU64::new(0),
        }
    }

    /// How many times `logout` has been invoked
    pub fn logout_count(&self) -> u64 {
        self.logouts.load(Ordering::Relaxed)
    }
}

impl TokenSource for MemoryTokenSource {
    fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, session: Session) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::Relaxed);
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
