//! Error types for the API client
//!
//! Every failure a caller can observe is an [`ApiError`]. Variants are `Clone`
//! so a single refresh outcome can be handed to many waiting requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Normalized body of a failed HTTP response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code
    pub status: u16,
    /// `detail`, then `message`, then the HTTP status text
    pub message: String,
    /// Machine-readable code from the response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Raw parsed response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Body with only a status and message
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            details: None,
        }
    }
}

/// API client errors
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("Network error: {message}")]
    Network {
        /// Transport error description
        message: String,
    },

    /// Deadline exceeded
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Backend answered with a non-2xx status
    #[error("API error ({}): {}", .0.status, .0.message)]
    Http(ErrorBody),

    /// 401 that survived a refresh attempt, or refresh failed
    #[error("Authentication expired ({}): {}", .0.status, .0.message)]
    AuthExpired(ErrorBody),

    /// Response payload did not match the requested type
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request could not be assembled (bad header, bad MIME type)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure-kind tag for an [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ErrorKind {
    Network,
    Timeout,
    Cancelled,
    Http,
    AuthExpired,
    Decode,
    Config,
    InvalidUrl,
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Http => "http",
            Self::AuthExpired => "auth_expired",
            Self::Decode => "decode",
            Self::Config => "config",
            Self::InvalidUrl => "invalid_url",
            Self::InvalidRequest => "invalid_request",
        };
        f.write_str(name)
    }
}

impl ApiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error with only a status and message
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http(ErrorBody::new(status, message))
    }

    /// Map a `reqwest` failure onto the taxonomy
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }

    /// Failure-kind tag
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Http(_) => ErrorKind::Http,
            Self::AuthExpired(_) => ErrorKind::AuthExpired,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Check if this error is retryable
    ///
    /// Connectivity failures, timeouts, 5xx and 429 are retried. Every other
    /// status, including 401, is terminal as far as backoff is concerned.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout(_) => true,
            Self::Http(body) => body.status >= 500 || body.status == 429,
            Self::Cancelled
            | Self::AuthExpired(_)
            | Self::Decode(_)
            | Self::Config(_)
            | Self::InvalidUrl(_)
            | Self::InvalidRequest(_) => false,
        }
    }

    /// Check if this is a plain 401 that may be recovered by a token refresh
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http(body) if body.status == 401)
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// HTTP status, when the failure came from a response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.body().map(|b| b.status)
    }

    /// Normalized response body, when the failure came from a response
    #[must_use]
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            Self::Http(body) | Self::AuthExpired(body) => Some(body),
            _ => None,
        }
    }

    /// Machine-readable code from the response body
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.body().and_then(|b| b.code.as_deref())
    }
}

impl From<glow_core::Error> for ApiError {
    fn from(err: glow_core::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
