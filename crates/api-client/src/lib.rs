//! Resilient authenticated HTTP client for the Glow marketplace backend
//!
//! Every request made by the web client goes through [`GlowClient`], which
//! layers the following over `reqwest`:
//!
//! - **Request building**: deterministic `{base}/api/{version}{path}?{query}` URLs
//!   and default headers, with the bearer token read fresh for every attempt
//! - **Deadlines and cancellation**: a per-attempt timeout composed with an
//!   optional caller [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Retry with exponential backoff**: network failures, timeouts, 5xx and 429
//! - **Single-flight token refresh**: concurrent 401s share one refresh call
//! - **Response normalization**: `{data, message, meta}` envelopes and a typed
//!   error taxonomy
//!
//! # Example
//!
//! ```rust,no_run
//! use glow_api_client::{GlowClient, MemoryTokenSource, RequestConfig, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tokens = Arc::new(MemoryTokenSource::with_session(
//!         Session::new("access").with_refresh_token("refresh"),
//!     ));
//!     let client = GlowClient::with_token_source(glow_api_client::ClientConfig::load()?, tokens)?;
//!
//!     let health = client.health().check().await?;
//!     println!("Backend healthy: {}", health.healthy);
//!
//!     let orders: glow_api_client::ApiEnvelope = client
//!         .get("/orders", RequestConfig::new().with_param("status", "pending"))
//!         .await?;
//!     println!("{:?}", orders.data);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod refresh;
pub mod request;
pub mod response;
pub mod retry;
pub mod session;
pub mod transport;

pub use client::GlowClient;
pub use config::{ClientConfig, Environment};
pub use error::{ApiError, ApiResult, ErrorBody, ErrorKind};
pub use refresh::RefreshFailure;
pub use request::{CacheMode, QueryParams, RequestBody, RequestConfig, RequestDescriptor, UploadPart};
pub use response::{ApiEnvelope, PageMeta};
pub use session::{MemoryTokenSource, Session, TokenSource};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::GlowClient;
    pub use crate::config::{ClientConfig, Environment};
    pub use crate::endpoints::{HealthApi, HealthStatus};
    pub use crate::error::{ApiError, ApiResult, ErrorKind};
    pub use crate::request::{CacheMode, QueryParams, RequestConfig, UploadPart};
    pub use crate::response::ApiEnvelope;
    pub use crate::session::{MemoryTokenSource, Session, TokenSource};
}
