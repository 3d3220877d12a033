//! Single HTTP exchange under a deadline and optional cancellation
//!
//! The deadline, the caller's cancellation token and the exchange itself race
//! in one `select!`. Whichever loses is dropped, which releases the timer and
//! aborts the in-flight request.

use crate::error::{ApiError, ApiResult};
use crate::request::RequestBody;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, RequestBuilder, Url};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Status and buffered payload of a completed exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response payload
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Thin wrapper over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
}

impl Transport {
    /// Build a transport
    ///
    /// No client-wide timeout is set; every exchange carries its own deadline.
    pub fn new() -> ApiResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| ApiError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Assemble a request for one attempt
    pub fn prepare(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: &RequestBody,
    ) -> ApiResult<RequestBuilder> {
        let builder = self.http.request(method, url).headers(headers);
        Ok(match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(value)?),
            RequestBody::Multipart(parts) => builder.multipart(RequestBody::to_form(parts)?),
        })
    }

    /// Perform one exchange
    ///
    /// The deadline takes priority over cancellation when both fire in the
    /// same poll.
    pub async fn send(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<RawResponse> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ApiError::Cancelled);
        }

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = tokio::time::sleep(timeout) => {
                trace!(timeout_ms = timeout.as_millis(), "Exchange timed out");
                Err(ApiError::Timeout(timeout))
            }
            () = cancelled => Err(ApiError::Cancelled),
            result = exchange(request) => result,
        }
    }
}

async fn exchange(request: RequestBuilder) -> ApiResult<RawResponse> {
    let response = request.send().await.map_err(|e| ApiError::from_transport(&e))?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::from_transport(&e))?
        .to_vec();

    Ok(RawResponse {
        status,
        content_type,
        body,
    })
}
