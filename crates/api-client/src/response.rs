//! Response normalization
//!
//! Raw responses become either an [`ApiEnvelope`] or an [`ErrorBody`]. The
//! backend is inconsistent about wrapping payloads in `data`, so both shapes
//! are accepted.

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::transport::RawResponse;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Total number of items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Whether another page exists
    #[serde(
        default,
        rename = "hasMore",
        alias = "has_more",
        skip_serializing_if = "Option::is_none"
    )]
    pub has_more: Option<bool>,
}

/// Normalized successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T = Value> {
    /// Payload; `None` for empty or non-JSON bodies
    pub data: Option<T>,
    /// Always `true` for an envelope returned by the client
    pub success: bool,
    /// Informational message from the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Pagination metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl ApiEnvelope<Value> {
    /// Deserialize the payload into `T`
    pub fn decode<T: DeserializeOwned>(self) -> ApiResult<ApiEnvelope<T>> {
        let data = match self.data {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| ApiError::Decode(format!("unexpected response payload: {e}")))?,
            ),
            None => None,
        };
        Ok(ApiEnvelope {
            data,
            success: self.success,
            message: self.message,
            meta: self.meta,
        })
    }
}

/// Parse a body as JSON when the content type says it is JSON
///
/// Empty or malformed JSON yields `None` rather than an error.
#[must_use]
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Option<Value> {
    let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
    if !is_json || body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok()
}

/// Build the envelope for a 2xx body
#[must_use]
pub fn normalize_success(body: Option<Value>) -> ApiEnvelope<Value> {
    let Some(body) = body else {
        return ApiEnvelope {
            data: None,
            success: true,
            message: None,
            meta: None,
        };
    };

    let (message, meta) = match &body {
        Value::Object(map) => (
            map.get("message").and_then(Value::as_str).map(str::to_owned),
            map.get("meta")
                .filter(|m| !m.is_null())
                .and_then(|m| serde_json::from_value(m.clone()).ok()),
        ),
        _ => (None, None),
    };

    let data = match body {
        Value::Object(mut map) if map.get("data").is_some_and(|d| !d.is_null()) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    ApiEnvelope {
        data: Some(data),
        success: true,
        message,
        meta,
    }
}

/// Build the error body for a non-2xx response
#[must_use]
pub fn normalize_error(status: u16, body: Option<Value>) -> ErrorBody {
    let field = |name: &str| {
        body.as_ref()
            .and_then(|b| b.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };

    let message = field("detail")
        .or_else(|| field("message"))
        .unwrap_or_else(|| status_text(status));

    let code = body.as_ref().and_then(|b| b.get("code")).and_then(|c| match c {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    ErrorBody {
        status,
        message,
        code,
        details: body,
    }
}

/// Turn a raw response into an envelope or an error
pub fn normalize(response: &RawResponse) -> ApiResult<ApiEnvelope<Value>> {
    let body = parse_body(response.content_type.as_deref(), &response.body);
    if response.is_success() {
        Ok(normalize_success(body))
    } else {
        Err(ApiError::Http(normalize_error(response.status, body)))
    }
}

fn status_text(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map_or_else(|| format!("Request failed with status {status}"), str::to_owned)
}
