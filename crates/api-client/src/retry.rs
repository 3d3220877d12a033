//! Retry loop around a single logical request
//!
//! A [`RetryPolicy`] lives for the whole logical request. Its counter is not
//! reset when the client replays after a token refresh, so the refresh never
//! grants a fresh budget and a 401 never consumes one.

use crate::error::{ApiError, ApiResult};
use glow_core::retry::RetryConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Retry state for one logical request
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    retries_used: u32,
    request_id: String,
    cancel: Option<CancellationToken>,
}

impl RetryPolicy {
    /// Fresh policy for a request
    pub fn new(config: RetryConfig, request_id: impl Into<String>) -> Self {
        Self {
            config,
            retries_used: 0,
            request_id: request_id.into(),
            cancel: None,
        }
    }

    /// Abort backoff waits when this token fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Option<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retries consumed so far
    #[must_use]
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    fn remaining(&self) -> u32 {
        self.config.max_retries.saturating_sub(self.retries_used)
    }

    /// Run `attempt` until it succeeds, fails terminally, or the budget runs out
    ///
    /// The last error is returned unchanged when retries are exhausted.
    pub async fn run<T, F, Fut>(&mut self, mut attempt: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || self.remaining() == 0 {
                return Err(err);
            }

            self.retries_used += 1;
            let delay = self.config.delay_for_retry(self.retries_used);
            debug!(
                request_id = %self.request_id,
                retry = self.retries_used,
                max_attempts = self.config.max_attempts(),
                delay_ms = delay.as_millis(),
                error = %err,
                "Request failed, retrying after backoff"
            );
            self.backoff(delay).await?;
        }
    }

    async fn backoff(&self, delay: std::time::Duration) -> ApiResult<()> {
        match &self.cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(ApiError::Cancelled),
                () = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
