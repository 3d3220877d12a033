//! Single-flight token refresh
//!
//! At most one refresh call is in flight per client. The first request to see
//! a 401 starts it; every other request that sees a 401 meanwhile awaits the
//! same shared outcome. The refresh runs as its own task, so a caller that
//! gives up does not take the refresh down with it.

use crate::error::ApiError;
use crate::request::{RequestBody, RequestConfig, RequestDescriptor, build_headers};
use crate::response::{normalize_error, parse_body};
use crate::session::{Session, TokenSource};
use crate::transport::Transport;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a refresh did not produce a new session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Not signed in, or the session has no refresh token
    #[error("no refresh token available")]
    NoRefreshToken,

    /// Backend refused the refresh token
    #[error("refresh rejected ({status}): {message}")]
    Rejected {
        /// HTTP status of the refresh response
        status: u16,
        /// Normalized error message
        message: String,
    },

    /// Refresh call failed before a response arrived
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// Response did not contain a usable session
    #[error("malformed refresh response")]
    MalformedResponse,

    /// Refresh task ended without an outcome
    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

/// Result shared with every request waiting on a refresh
pub type RefreshOutcome = Result<(), RefreshFailure>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Coordinates token refreshes for one client
pub struct RefreshCoordinator {
    transport: Transport,
    url: Url,
    client_info: String,
    timeout: Duration,
    tokens: Arc<dyn TokenSource>,
    in_flight: Mutex<Option<InFlight>>,
    refreshes: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("url", &self.url.as_str())
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator posting to `url`
    pub fn new(
        transport: Transport,
        url: Url,
        client_info: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            transport,
            url,
            client_info: client_info.into(),
            timeout,
            tokens,
            in_flight: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Token source shared with the client
    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenSource> {
        &self.tokens
    }

    /// Number of refresh calls sent to the backend
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Whether a refresh is currently running
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Obtain a usable token after a 401
    ///
    /// `stale_token` is the token the failing request was sent with. When the
    /// source already holds a different token the request may simply be
    /// replayed and no refresh is started.
    pub async fn refresh(self: &Arc<Self>, stale_token: Option<&str>) -> RefreshOutcome {
        let shared = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("Joining in-flight token refresh");
                    in_flight.clone()
                }
                None => {
                    let current = self.tokens.get_token();
                    if current.is_some() && current.as_deref() != stale_token {
                        debug!("Token changed since the request was sent, replaying");
                        return Ok(());
                    }
                    let in_flight = self.start();
                    *slot = Some(in_flight.clone());
                    in_flight
                }
            }
        };
        shared.await
    }

    // Caller holds the slot lock.
    fn start(self: &Arc<Self>) -> InFlight {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = this.perform().await;
            match &outcome {
                Ok(session) => {
                    info!("Token refreshed");
                    this.tokens.set_session(session.clone());
                }
                Err(failure) => {
                    warn!(error = %failure, "Token refresh failed, signing out");
                    this.tokens.logout();
                }
            }
            this.clear();
            outcome.map(|_| ())
        });

        let this = Arc::clone(self);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join) => {
                    this.clear();
                    Err(RefreshFailure::Aborted(join.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    fn clear(&self) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn perform(&self) -> Result<Session, RefreshFailure> {
        let previous = self.tokens.session();
        let refresh_token = previous
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(RefreshFailure::NoRefreshToken)?;

        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let descriptor = RequestDescriptor::new(
            Method::POST,
            self.url.path(),
            RequestBody::Json(json!({ "refresh_token": &refresh_token })),
            RequestConfig::new(),
        );
        let transport_err = |e: ApiError| RefreshFailure::Transport(e.to_string());
        let headers = build_headers(&descriptor, &self.client_info, None).map_err(transport_err)?;
        let request = self
            .transport
            .prepare(Method::POST, self.url.clone(), headers, descriptor.body())
            .map_err(transport_err)?;
        let response = self
            .transport
            .send(request, self.timeout, None)
            .await
            .map_err(transport_err)?;

        let body = parse_body(response.content_type.as_deref(), &response.body);
        if !response.is_success() {
            let error = normalize_error(response.status, body);
            return Err(RefreshFailure::Rejected {
                status: error.status,
                message: error.message,
            });
        }

        body.and_then(|b| parse_refresh_response(b, &refresh_token))
            .ok_or(RefreshFailure::MalformedResponse)
    }
}

#[derive(Deserialize)]
struct RefreshedSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Extract a session from a refresh response
///
/// Accepts the session flat, under `session`, or under `data` (optionally
/// nested once more under `session`). A missing refresh token keeps
/// `previous_refresh_token`.
#[must_use]
pub fn parse_refresh_response(body: Value, previous_refresh_token: &str) -> Option<Session> {
    let candidates = [
        body.get("session"),
        body.get("data").and_then(|d| d.get("session")),
        body.get("data"),
        Some(&body),
    ];

    let refreshed = candidates
        .into_iter()
        .flatten()
        .find_map(|v| serde_json::from_value::<RefreshedSession>(v.clone()).ok())
        .filter(|s| !s.access_token.is_empty())?;

    let refresh_token = refreshed
        .refresh_token
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| previous_refresh_token.to_string());

    let mut session = Session::new(refreshed.access_token).with_refresh_token(refresh_token);
    session.expires_at = refreshed.expires_at;
    Some(session)
}
