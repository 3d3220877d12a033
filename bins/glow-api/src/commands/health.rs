//! Health check command

use crate::OutputFormat;
use crate::connection::Connection;
use crate::output;
use anyhow::{Result, bail};
use owo_colors::OwoColorize;

/// Probe the backend and report its status
pub async fn run(connection: &Connection, format: OutputFormat) -> Result<()> {
    let client = connection.client()?;
    let status = client.health().check().await?;

    if format == OutputFormat::Json {
        output::pretty(&serde_json::to_value(&status)?);
    } else {
        output::header("Glow API Health Check");
        println!("  URL:       {}", status.url);

        let verdict = match (status.healthy, status.status_code) {
            (true, Some(code)) => format!("{} ({code})", "✓ healthy".green()),
            (false, Some(code)) => format!("{} ({code})", "✗ unhealthy".red()),
            (_, None) => format!("{}", "✗ unreachable".red()),
        };
        println!("  Status:    {verdict}");
        if let Some(reported) = &status.status {
            println!("  Reported:  {reported}");
        }
        if let Some(version) = &status.version {
            println!("  Version:   {version}");
        }
        println!("  Latency:   {}ms", status.response_time.as_millis());
        if let Some(error) = &status.error {
            println!("  Error:     {}", error.dimmed());
        }
        println!();
    }

    if !status.healthy {
        bail!("backend at {} is not healthy", status.url);
    }
    Ok(())
}
