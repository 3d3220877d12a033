//! Client construction from CLI flags, config file and environment

use anyhow::{Context, Result};
use clap::Args;
use glow_api_client::{ClientConfig, GlowClient, MemoryTokenSource, Session};
use std::sync::Arc;

/// Connection flags shared by every command
#[derive(Args, Debug, Default)]
pub struct Connection {
    /// Backend origin; overrides config file and GLOW_API_URL
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Access token sent as a bearer token
    #[arg(long, global = true, env = "GLOW_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Refresh token used when the access token expires
    #[arg(long, global = true, env = "GLOW_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,
}

impl Connection {
    /// Resolve the client configuration
    pub fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load().context("failed to load client configuration")?;
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(config)
    }

    /// Build a client holding the session given on the command line
    pub fn client(&self) -> Result<GlowClient> {
        let config = self.config()?;
        if !config.is_backend_configured() {
            tracing::warn!(base_url = %config.base_url, "No backend configured, using the local default");
        }

        let tokens = match &self.token {
            Some(token) => {
                let mut session = Session::new(token.clone());
                if let Some(refresh) = &self.refresh_token {
                    session = session.with_refresh_token(refresh.clone());
                }
                MemoryTokenSource::with_session(session)
            }
            None => MemoryTokenSource::new(),
        };

        GlowClient::with_token_source(config, Arc::new(tokens)).context("invalid client configuration")
    }
}
