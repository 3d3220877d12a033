//! Main API client implementation

use crate::config::ClientConfig;
use crate::endpoints::HealthApi;
use crate::error::{ApiError, ApiResult};
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::request::{
    QueryParams, RequestBody, RequestConfig, RequestDescriptor, UploadPart, build_headers, build_url,
};
use crate::response::{ApiEnvelope, normalize};
use crate::retry::RetryPolicy;
use crate::session::{MemoryTokenSource, TokenSource};
use crate::transport::Transport;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Glow API client with retry and single-flight token refresh
///
/// This client wraps `reqwest` and adds:
/// - Deadlines and caller cancellation on every attempt
/// - Automatic retry with exponential backoff
/// - Transparent token refresh on 401, shared by concurrent requests
/// - Request correlation IDs for tracing
///
/// Cloning is cheap; clones share the connection pool and refresh state.
#[derive(Clone)]
pub struct GlowClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Transport,
    refresh: Arc<RefreshCoordinator>,
}

impl std::fmt::Debug for GlowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowClient")
            .field("base_url", &self.inner.config.base_url)
            .field("api_version", &self.inner.config.api_version)
            .finish_non_exhaustive()
    }
}

impl GlowClient {
    /// Create a signed-out client configured from file and environment
    pub fn new() -> ApiResult<Self> {
        Self::with_config(ClientConfig::load()?)
    }

    /// Create a signed-out client with specific configuration
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        Self::with_token_source(config, Arc::new(MemoryTokenSource::new()))
    }

    /// Create a client reading credentials from `tokens`
    pub fn with_token_source(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> ApiResult<Self> {
        config.validate()?;

        let transport = Transport::new()?;
        let refresh_url = build_url(
            config.origin(),
            &config.api_version,
            &config.refresh_path,
            &QueryParams::new(),
        )?;
        let refresh = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            refresh_url,
            config.client_info.clone(),
            config.timeout,
            tokens,
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                refresh,
            }),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Credentials store used by this client
    #[must_use]
    pub fn token_source(&self) -> &Arc<dyn TokenSource> {
        self.inner.refresh.tokens()
    }

    /// Number of refresh calls this client has sent
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh.refresh_count()
    }

    /// Absolute URL for an endpoint below `/api/{version}`
    pub fn build_url(&self, endpoint: &str, params: &QueryParams) -> ApiResult<Url> {
        let config = &self.inner.config;
        build_url(config.origin(), &config.api_version, endpoint, params)
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    // -------------------------------------------------------------------------
    // Endpoint API accessors
    // -------------------------------------------------------------------------

    /// Access health check endpoints
    #[must_use]
    pub fn health(&self) -> HealthApi {
        HealthApi::new(self.clone())
    }

    // -------------------------------------------------------------------------
    // HTTP verbs
    // -------------------------------------------------------------------------

    /// Perform a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        self.execute(RequestDescriptor::new(Method::GET, endpoint, RequestBody::Empty, config))
            .await
    }

    /// Perform a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        self.send_json(Method::POST, endpoint, body, config).await
    }

    /// Perform a PUT request with a JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        self.send_json(Method::PUT, endpoint, body, config).await
    }

    /// Perform a PATCH request with a JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        self.send_json(Method::PATCH, endpoint, body, config).await
    }

    /// Perform a DELETE request
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        self.execute(RequestDescriptor::new(Method::DELETE, endpoint, RequestBody::Empty, config))
            .await
    }

    /// POST a `multipart/form-data` upload
    ///
    /// Uses the upload deadline unless the call sets its own.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        parts: Vec<UploadPart>,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        self.execute(RequestDescriptor::new(
            Method::POST,
            endpoint,
            RequestBody::Multipart(parts),
            config,
        ))
        .await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> ApiResult<ApiEnvelope<T>> {
        let body = RequestBody::json(body)?;
        self.execute(RequestDescriptor::new(method, endpoint, body, config))
            .await
    }

    /// Run a request through retry, refresh and normalization
    ///
    /// A 401 triggers at most one refresh per call. The replay continues the
    /// same retry budget; a second 401 ends the call with
    /// [`ApiError::AuthExpired`].
    #[instrument(
        skip(self, descriptor),
        fields(
            request_id = %descriptor.request_id(),
            method = %descriptor.method(),
            endpoint = descriptor.endpoint(),
        )
    )]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> ApiResult<ApiEnvelope<T>> {
        let config = &self.inner.config;
        let url = self.build_url(descriptor.endpoint(), descriptor.params())?;
        let timeout = descriptor.timeout().unwrap_or(if descriptor.body().is_multipart() {
            config.upload_timeout
        } else {
            config.timeout
        });

        let mut retry = config.retry.clone();
        if let Some(max_retries) = descriptor.max_retries() {
            retry.max_retries = max_retries;
        }
        let mut policy = RetryPolicy::new(retry, descriptor.request_id())
            .with_cancellation(descriptor.cancellation().cloned());

        let mut refreshed = false;
        loop {
            let mut sent_token = None;
            let result = policy
                .run(|| {
                    let token = self.token_source().get_token();
                    let prepared = build_headers(&descriptor, &config.client_info, token.as_deref())
                        .and_then(|headers| {
                            self.inner.transport.prepare(
                                descriptor.method().clone(),
                                url.clone(),
                                headers,
                                descriptor.body(),
                            )
                        });
                    sent_token = token;
                    self.attempt(prepared, timeout, descriptor.cancellation())
                })
                .await;

            let unauthorized = match result {
                Ok(envelope) => return envelope.decode(),
                Err(ApiError::Http(body)) if body.status == 401 => body,
                Err(err) => {
                    debug!(retries = policy.retries_used(), error = %err, "Request failed");
                    return Err(err);
                }
            };

            if refreshed {
                warn!("Request still unauthorized after token refresh");
                return Err(ApiError::AuthExpired(unauthorized));
            }
            refreshed = true;

            debug!("Unauthorized, awaiting token refresh");
            if let Err(failure) = self
                .await_refresh(sent_token.as_deref(), descriptor.cancellation())
                .await?
            {
                debug!(error = %failure, "Refresh failed, giving up");
                return Err(ApiError::AuthExpired(unauthorized));
            }
        }
    }

    async fn attempt(
        &self,
        prepared: ApiResult<reqwest::RequestBuilder>,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<ApiEnvelope<serde_json::Value>> {
        let response = self.inner.transport.send(prepared?, timeout, cancel).await?;
        debug!(status = response.status, bytes = response.body.len(), "Response received");
        normalize(&response)
    }

    async fn await_refresh(
        &self,
        sent_token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<RefreshOutcome> {
        let refresh = self.inner.refresh.refresh(sent_token);
        match cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(ApiError::Cancelled),
                outcome = refresh => Ok(outcome),
            },
            None => Ok(refresh.await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GlowClient::with_config(ClientConfig::development());
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = GlowClient::with_config(ClientConfig::default().with_base_url("")).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_build_url_uses_config() {
        let client = GlowClient::with_config(
            ClientConfig::default()
                .with_base_url("https://api.glow.shop/")
                .with_api_version("v2"),
        )
        .unwrap();
        let url = client
            .build_url("orders", &QueryParams::new().with("status", "pending"))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.glow.shop/api/v2/orders?status=pending");
    }
}
