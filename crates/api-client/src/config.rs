//! Configuration for the Glow API client
//!
//! Settings resolve in three layers: built-in defaults, an optional TOML file,
//! then environment variables.

use crate::error::{ApiError, ApiResult};
use glow_core::config::ConfigFile;
use glow_core::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Backend URL used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Config file names searched in the working and home directories
pub const CONFIG_CANDIDATES: &[&str] = &[".glow.toml", "glow.toml", ".config/glow.toml"];

/// Environment types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (backend on localhost)
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    #[default]
    Production,
}

impl Environment {
    /// Parse an environment name, defaulting to production
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "development" | "dev" | "local" => Self::Development,
            "staging" | "stage" => Self::Staging,
            _ => Self::Production,
        }
    }

}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin, without the `/api/{version}` prefix
    pub base_url: String,
    /// API version segment
    pub api_version: String,
    /// Deadline for ordinary requests
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Deadline for multipart uploads
    #[serde(with = "secs")]
    pub upload_timeout: Duration,
    /// Retry budget and backoff schedule
    pub retry: RetryConfig,
    /// Value of the `X-Client-Info` header
    pub client_info: String,
    /// Endpoint exchanging a refresh token for a new session
    pub refresh_path: String,
    /// Health endpoint, relative to the origin rather than the API prefix
    pub health_path: String,
    /// Current environment
    pub environment: Environment,
}

/// Timeouts as (possibly fractional) seconds
mod secs {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_version: "v1".to_string(),
            timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
            client_info: concat!("glow-api-client/", env!("CARGO_PKG_VERSION")).to_string(),
            refresh_path: "/auth/refresh".to_string(),
            health_path: "/health".to_string(),
            environment: Environment::default(),
        }
    }
}

/// File layout: client settings live under `[api]`
#[derive(Debug, Default, Deserialize)]
struct FileSchema {
    #[serde(default)]
    api: Option<ClientConfig>,
}

impl ClientConfig {
    /// Resolve configuration from defaults, config file, and environment
    ///
    /// The file is `GLOW_CONFIG` when set, otherwise the first of
    /// [`CONFIG_CANDIDATES`] that exists.
    pub fn load() -> ApiResult<Self> {
        let explicit = env::var_os("GLOW_CONFIG").map(PathBuf::from);
        let file: ConfigFile<FileSchema> = ConfigFile::load(explicit.as_deref(), CONFIG_CANDIDATES)?;

        if let Some(path) = &file.path {
            tracing::debug!(path = %path.display(), "Loaded client config file");
        }

        let base = file.schema.api.unwrap_or_default();
        Ok(base.apply_overrides(|key| env::var(key).ok()))
    }

    /// Layer variables from `lookup` over this configuration
    ///
    /// Recognized variables:
    /// - `GLOW_API_URL`, `API_URL` or `FASTAPI_URL`: backend origin
    /// - `GLOW_API_VERSION`: API version segment
    /// - `GLOW_TIMEOUT_SECS` / `GLOW_UPLOAD_TIMEOUT_SECS`: deadlines
    /// - `GLOW_MAX_RETRIES` / `GLOW_RETRY_DELAY_MS`: retry budget
    /// - `GLOW_CLIENT_INFO`: client identifier header
    /// - `GLOW_ENV`: environment (development/staging/production)
    ///
    /// Unparseable numeric values are ignored with a warning.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("GLOW_API_URL")
            .or_else(|| lookup("API_URL"))
            .or_else(|| lookup("FASTAPI_URL"))
        {
            self.base_url = url;
        }
        if let Some(version) = lookup("GLOW_API_VERSION") {
            self.api_version = version;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GLOW_TIMEOUT_SECS") {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GLOW_UPLOAD_TIMEOUT_SECS") {
            self.upload_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>(&lookup, "GLOW_MAX_RETRIES") {
            self.retry.max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "GLOW_RETRY_DELAY_MS") {
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(info) = lookup("GLOW_CLIENT_INFO") {
            self.client_info = info;
        }
        if let Some(name) = lookup("GLOW_ENV") {
            self.environment = Environment::parse(&name);
        }

        self
    }

    /// Create development configuration (local backend, quick retries)
    #[must_use]
    pub fn development() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::quick(),
            environment: Environment::Development,
            ..Self::default()
        }
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set the API version
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set the upload timeout
    #[must_use]
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Builder-style method to set retry config
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builder-style method to set the client identifier
    #[must_use]
    pub fn with_client_info(mut self, info: impl Into<String>) -> Self {
        self.client_info = info.into();
        self
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Whether a real backend has been configured
    ///
    /// The local default counts as unconfigured.
    #[must_use]
    pub fn is_backend_configured(&self) -> bool {
        let origin = self.origin();
        !origin.is_empty() && origin != DEFAULT_API_URL
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::config("base_url cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::config("base_url must start with http:// or https://"));
        }

        if self.api_version.is_empty() || self.api_version.contains('/') {
            return Err(ApiError::config("api_version must be a single path segment"));
        }

        if self.timeout.is_zero() || self.upload_timeout.is_zero() {
            return Err(ApiError::config("timeouts cannot be zero"));
        }

        if !self.refresh_path.starts_with('/') {
            return Err(ApiError::config("refresh_path must start with '/'"));
        }

        if !self.health_path.starts_with('/') {
            return Err(ApiError::config("health_path must start with '/'"));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.upload_timeout, Duration::from_secs(120));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert!(config.validate().is_ok());
        assert!(!config.is_backend_configured());
    }

    #[test]
    fn test_development_config() {
        let config = ClientConfig::development();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.retry, RetryConfig::quick());
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::default().apply_overrides(lookup_from(&[
            ("API_URL", "https://api.glow.shop/"),
            ("GLOW_API_VERSION", "v2"),
            ("GLOW_TIMEOUT_SECS", "15"),
            ("GLOW_MAX_RETRIES", "5"),
            ("GLOW_RETRY_DELAY_MS", "250"),
            ("GLOW_ENV", "staging"),
        ]));

        assert_eq!(config.origin(), "https://api.glow.shop");
        assert_eq!(config.api_version, "v2");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.environment, Environment::Staging);
        assert!(config.is_backend_configured());
    }

    #[test]
    fn test_url_variable_precedence() {
        let config = ClientConfig::default().apply_overrides(lookup_from(&[
            ("FASTAPI_URL", "https://fastapi.example"),
            ("GLOW_API_URL", "https://glow.example"),
        ]));
        assert_eq!(config.base_url, "https://glow.example");
    }

    #[test]
    fn test_bad_numbers_are_ignored() {
        let config = ClientConfig::default()
            .apply_overrides(lookup_from(&[("GLOW_TIMEOUT_SECS", "soon"), ("GLOW_MAX_RETRIES", "")]));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::default()
            .with_base_url("https://api.test")
            .with_timeout(Duration::from_secs(60))
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.base_url, "https://api.test");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_validation() {
        assert!(ClientConfig::default().with_base_url("").validate().is_err());
        assert!(ClientConfig::default().with_base_url("ftp://x").validate().is_err());
        assert!(ClientConfig::default().with_timeout(Duration::ZERO).validate().is_err());
        assert!(ClientConfig::default().with_api_version("v1/x").validate().is_err());
    }

    #[test]
    fn test_relative_paths_are_rejected() {
        let health = ClientConfig {
            health_path: "health".to_string(),
            ..ClientConfig::default().with_base_url("https://api.glow.shop")
        };
        let err = health.validate().unwrap_err();
        assert!(err.to_string().contains("health_path"));

        let refresh = ClientConfig {
            refresh_path: "auth/refresh".to_string(),
            ..ClientConfig::default()
        };
        assert!(refresh.validate().is_err());
    }

    #[test]
    fn test_sub_second_timeouts_survive_serialization() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_upload_timeout(Duration::from_millis(1500));
        assert!(config.validate().is_ok());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 0.5);
        assert_eq!(json["upload_timeout"], 1.5);

        let back: ClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.timeout, Duration::from_millis(500));
        assert_eq!(back.upload_timeout, Duration::from_millis(1500));
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_negative_timeout_is_a_parse_error() {
        let parsed: Result<FileSchema, _> = toml::from_str("[api]\ntimeout = -1");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_toml_layout() {
        let schema: FileSchema = toml::from_str(
            r#"
            [api]
            base_url = "https://api.glow.shop"
            timeout = 20
            upload_timeout = 0.25

            [api.retry]
            max_retries = 1
            base_delay = 500
            max_delay = 5000
            backoff_multiplier = 2.0
            "#,
        )
        .unwrap();

        let config = schema.api.unwrap();
        assert_eq!(config.base_url, "https://api.glow.shop");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.upload_timeout, Duration::from_millis(250));
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
    }
}
