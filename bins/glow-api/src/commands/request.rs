//! Raw verb commands (get, post, put, patch, delete)

use crate::connection::Connection;
use crate::output;
use crate::{OutputFormat, RequestArgs};
use anyhow::{Context, Result, anyhow};
use glow_api_client::{ApiEnvelope, RequestConfig};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// HTTP verb to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Parse a `--body` argument; `@path` reads the file
pub fn read_body(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("body is not valid JSON")
}

fn request_config(args: &RequestArgs) -> RequestConfig {
    let mut config = RequestConfig::new()
        .with_params(args.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    for (name, value) in &args.headers {
        config = config.with_header(name.clone(), value.clone());
    }
    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if let Some(retries) = args.retries {
        config = config.with_max_retries(retries);
    }
    config
}

/// Send one request and print the normalized result
pub async fn run(
    connection: &Connection,
    verb: Verb,
    endpoint: &str,
    body: Option<Value>,
    args: &RequestArgs,
    format: OutputFormat,
) -> Result<()> {
    let client = connection.client()?;
    let config = request_config(args);
    let body = body.unwrap_or(Value::Null);

    let start = Instant::now();
    let result: glow_api_client::ApiResult<ApiEnvelope> = match verb {
        Verb::Get => client.get(endpoint, config).await,
        Verb::Post => client.post(endpoint, &body, config).await,
        Verb::Put => client.put(endpoint, &body, config).await,
        Verb::Patch => client.patch(endpoint, &body, config).await,
        Verb::Delete => client.delete(endpoint, config).await,
    };
    let elapsed = start.elapsed();

    match (result, format) {
        (Ok(envelope), OutputFormat::Json) => {
            output::pretty(&serde_json::to_value(&envelope)?);
            Ok(())
        }
        (Ok(envelope), OutputFormat::Text) => {
            println!(
                "{} {} {} {}",
                "✓".green(),
                verb.as_str().bold(),
                endpoint,
                format!("({}ms)", elapsed.as_millis()).dimmed()
            );
            if let Some(message) = &envelope.message {
                println!("  {} {}", "message:".dimmed(), message);
            }
            if let Some(meta) = &envelope.meta {
                let field = |v: Option<u64>| v.map_or_else(|| "?".to_string(), |n| n.to_string());
                println!(
                    "  {} page {} · limit {} · total {}{}",
                    "meta:".dimmed(),
                    field(meta.page),
                    field(meta.limit),
                    field(meta.total),
                    if meta.has_more == Some(true) { " · more" } else { "" }
                );
            }
            match &envelope.data {
                Some(data) => output::pretty(data),
                None => println!("  {}", "(no content)".dimmed()),
            }
            Ok(())
        }
        (Err(err), OutputFormat::Json) => {
            output::pretty(&output::error_json(&err));
            Err(anyhow!(err))
        }
        (Err(err), OutputFormat::Text) => {
            println!(
                "{} {} {} {}",
                "✗".red(),
                verb.as_str().bold(),
                endpoint,
                format!("({}ms)", elapsed.as_millis()).dimmed()
            );
            if let Some(details) = err.body().and_then(|b| b.details.as_ref()) {
                output::pretty(details);
            }
            Err(anyhow!(err))
        }
    }
}
