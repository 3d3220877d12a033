//! Health check endpoint

use crate::client::GlowClient;
use crate::error::{ApiError, ApiResult};
use crate::request::RequestBody;
use crate::response::parse_body;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Deadline for a health probe
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check API interface
#[derive(Debug, Clone)]
pub struct HealthApi {
    client: GlowClient,
}

impl HealthApi {
    /// Create a new health API interface
    pub(crate) fn new(client: GlowClient) -> Self {
        Self { client }
    }

    /// URL probed by [`check`](Self::check)
    pub fn url(&self) -> ApiResult<Url> {
        let config = self.client.config();
        let raw = format!("{}{}", config.origin(), config.health_path);
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Probe the backend once
    ///
    /// HTTP and connectivity failures are reported in the returned status
    /// rather than as errors.
    pub async fn check(&self) -> ApiResult<HealthStatus> {
        let url = self.url()?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let request = self
            .client
            .transport()
            .prepare(Method::GET, url.clone(), headers, &RequestBody::Empty)?;

        let start = Instant::now();
        let result = self.client.transport().send(request, HEALTH_TIMEOUT, None).await;
        let response_time = start.elapsed();

        let status = match result {
            Ok(response) => {
                let body: Option<HealthResponse> =
                    parse_body(response.content_type.as_deref(), &response.body)
                        .and_then(|v| serde_json::from_value(v).ok());
                let (status, version) = body.map_or((None, None), |b| (b.status, b.version));
                HealthStatus {
                    url: url.to_string(),
                    healthy: response.is_success(),
                    status_code: Some(response.status),
                    response_time,
                    status,
                    version,
                    error: None,
                }
            }
            Err(err) => HealthStatus {
                url: url.to_string(),
                healthy: false,
                status_code: None,
                response_time,
                status: None,
                version: None,
                error: Some(err.to_string()),
            },
        };

        debug!(
            url = %status.url,
            healthy = status.healthy,
            elapsed_ms = status.response_time.as_millis(),
            "Health probe finished"
        );
        Ok(status)
    }
}

/// Body returned by the health endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy", "ok")
    #[serde(default)]
    pub status: Option<String>,
    /// Backend version
    #[serde(default)]
    pub version: Option<String>,
}

/// Result of a health probe
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// URL that was checked
    pub url: String,
    /// Whether the backend answered with 2xx
    pub healthy: bool,
    /// HTTP status, if the backend answered at all
    pub status_code: Option<u16>,
    /// Round-trip time
    #[serde(serialize_with = "as_millis")]
    pub response_time: Duration,
    /// Status reported by the backend
    pub status: Option<String>,
    /// Version reported by the backend
    pub version: Option<String>,
    /// Transport failure, when unreachable
    pub error: Option<String>,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
