//! Request description and the pure URL/header builders
//!
//! A [`RequestDescriptor`] is assembled once per logical call and never
//! mutated afterwards. Headers are rebuilt from it for every attempt so that a
//! token refreshed between attempts is picked up.

use crate::error::{ApiError, ApiResult};
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Request correlation ID header
pub const X_REQUEST_ID: &str = "X-Request-ID";

/// Client identifier header
pub const X_CLIENT_INFO: &str = "X-Client-Info";

/// Insertion-ordered query parameters with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an existing value in place
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        let key = key.into();
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    /// Set a parameter when present; `None` removes the key
    pub fn set_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) -> &mut Self {
        match value {
            Some(value) => self.set(key, value),
            None => {
                let key: String = key.into();
                self.remove(&key)
            }
        }
    }

    /// Builder-style [`set`](Self::set)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style [`set_opt`](Self::set_opt)
    #[must_use]
    pub fn with_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.set_opt(key, value);
        self
    }

    /// Remove a parameter
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.pairs.retain(|(k, _)| k != key);
        self
    }

    /// Build from a JSON object
    ///
    /// `null` members are omitted; strings are taken verbatim and every other
    /// value uses its compact JSON rendering (`true`, `12`, `[1,2]`).
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let mut params = Self::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                match value {
                    Value::Null => {}
                    Value::String(s) => {
                        params.set(key.clone(), s);
                    }
                    other => {
                        params.set(key.clone(), other);
                    }
                }
            }
        }
        params
    }

    /// Look up a parameter
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

/// Payload of a multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    /// Plain form value
    Text(String),
    /// File contents
    Bytes(Vec<u8>),
}

/// One field of a multipart upload
///
/// Kept as plain data so the form can be rebuilt for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    /// Form field name
    pub name: String,
    /// Field payload
    pub content: PartContent,
    /// File name reported to the server
    pub file_name: Option<String>,
    /// MIME type of the payload
    pub mime: Option<String>,
}

impl UploadPart {
    /// Plain text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Text(value.into()),
            file_name: None,
            mime: None,
        }
    }

    /// File field
    pub fn file(name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Bytes(bytes),
            file_name: Some(file_name.into()),
            mime: None,
        }
    }

    /// Builder-style method to set the MIME type
    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    fn to_part(&self) -> ApiResult<reqwest::multipart::Part> {
        let mut part = match &self.content {
            PartContent::Text(text) => reqwest::multipart::Part::text(text.clone()),
            PartContent::Bytes(bytes) => reqwest::multipart::Part::bytes(bytes.clone()),
        };
        if let Some(file_name) = &self.file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(mime) = &self.mime {
            part = part
                .mime_str(mime)
                .map_err(|_| ApiError::InvalidRequest(format!("invalid MIME type: {mime}")))?;
        }
        Ok(part)
    }
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// JSON document
    Json(Value),
    /// `multipart/form-data` fields
    Multipart(Vec<UploadPart>),
}

impl RequestBody {
    /// Serialize a value as a JSON body; `null` means no body
    pub fn json<B: Serialize + ?Sized>(body: &B) -> ApiResult<Self> {
        match serde_json::to_value(body)? {
            Value::Null => Ok(Self::Empty),
            value => Ok(Self::Json(value)),
        }
    }

    /// Whether this is a multipart body
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// Build the `reqwest` form for a multipart body
    pub(crate) fn to_form(parts: &[UploadPart]) -> ApiResult<reqwest::multipart::Form> {
        parts.iter().try_fold(reqwest::multipart::Form::new(), |form, part| {
            Ok(form.part(part.name.clone(), part.to_part()?))
        })
    }
}

/// HTTP cache behaviour requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Let intermediaries decide
    #[default]
    Default,
    /// Never store the response
    NoStore,
    /// Revalidate before using a cached response
    NoCache,
    /// Bypass caches entirely
    Reload,
    /// Accept a cached response regardless of age
    ForceCache,
}

impl CacheMode {
    /// `Cache-Control` request directive for this mode
    #[must_use]
    pub fn cache_control(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::NoStore => Some("no-store"),
            Self::NoCache | Self::Reload => Some("no-cache"),
            Self::ForceCache => Some("max-stale"),
        }
    }
}

/// Per-call options accepted by every verb
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Extra headers; override defaults but never `Authorization`
    pub headers: Vec<(String, String)>,
    /// Query parameters
    pub params: QueryParams,
    /// Deadline for each attempt; defaults from [`ClientConfig`](crate::ClientConfig)
    pub timeout: Option<Duration>,
    /// Caller cancellation, composed with the deadline
    pub cancellation: Option<CancellationToken>,
    /// Cache directive
    pub cache: CacheMode,
    /// Override of the configured retry budget
    pub max_retries: Option<u32>,
}

impl RequestConfig {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.set(key, value);
        self
    }

    /// Replace all query parameters
    #[must_use]
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    /// Set the per-attempt deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the cache directive
    #[must_use]
    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Override the retry budget for this call
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

/// Everything needed to perform one logical request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    endpoint: String,
    body: RequestBody,
    config: RequestConfig,
    request_id: String,
}

impl RequestDescriptor {
    /// Describe a request; a fresh request id is generated
    pub fn new(
        method: Method,
        endpoint: impl Into<String>,
        body: RequestBody,
        config: RequestConfig,
    ) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body,
            config,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Endpoint path below `/api/{version}`
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Payload
    #[must_use]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Query parameters
    #[must_use]
    pub fn params(&self) -> &QueryParams {
        &self.config.params
    }

    /// Caller headers
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.config.headers
    }

    /// Caller deadline, if any
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    /// Caller cancellation, if any
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.config.cancellation.as_ref()
    }

    /// Cache directive
    #[must_use]
    pub fn cache(&self) -> CacheMode {
        self.config.cache
    }

    /// Retry budget override, if any
    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.config.max_retries
    }

    /// Correlation id sent as `X-Request-ID` on every attempt
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Build `{origin}/api/{version}{endpoint}?{params}`
///
/// A trailing `/` on the origin is dropped and a missing leading `/` on the
/// endpoint is added. No `?` is emitted when there are no parameters.
pub fn build_url(origin: &str, api_version: &str, endpoint: &str, params: &QueryParams) -> ApiResult<Url> {
    let origin = origin.trim_end_matches('/');
    let separator = if endpoint.starts_with('/') { "" } else { "/" };
    let raw = format!("{origin}/api/{api_version}{separator}{endpoint}");

    let mut url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url)
}

/// Build the header set for one attempt
///
/// Precedence, lowest first: defaults, caller headers, `Authorization`.
/// `Content-Type` is left to the multipart encoder for uploads.
pub fn build_headers(
    descriptor: &RequestDescriptor,
    client_info: &str,
    token: Option<&str>,
) -> ApiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if !descriptor.body().is_multipart() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers.insert(X_CLIENT_INFO, header_value(X_CLIENT_INFO, client_info)?);
    headers.insert(X_REQUEST_ID, header_value(X_REQUEST_ID, descriptor.request_id())?);
    if let Some(directive) = descriptor.cache().cache_control() {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(directive));
    }

    for (name, value) in descriptor.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("invalid header name: {name}")))?;
        let value = header_value(name.as_str(), value)?;
        headers.insert(name, value);
    }

    match token.filter(|t| !t.is_empty()) {
        Some(token) => {
            let mut value = header_value("Authorization", &format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        // A caller header must not smuggle in stale credentials.
        None => {
            headers.remove(AUTHORIZATION);
        }
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::InvalidRequest(format!("invalid value for header {name}")))
}
