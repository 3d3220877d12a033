//! Show the resolved client configuration

use crate::OutputFormat;
use crate::connection::Connection;
use crate::output;
use anyhow::Result;
use owo_colors::OwoColorize;

/// Print the configuration the client would use
pub fn run(connection: &Connection, format: OutputFormat) -> Result<()> {
    let config = connection.config()?;

    if format == OutputFormat::Json {
        let mut value = serde_json::to_value(&config)?;
        value["backend_configured"] = config.is_backend_configured().into();
        value["signed_in"] = connection.token.is_some().into();
        output::pretty(&value);
        return Ok(());
    }

    output::header("Glow API Configuration");
    let yes_no = |flag: bool| {
        if flag {
            "yes".green().to_string()
        } else {
            "no".yellow().to_string()
        }
    };

    println!("  Base URL:        {}", config.base_url);
    println!("  API version:     {}", config.api_version);
    println!("  Environment:     {:?}", config.environment);
    println!("  Timeout:         {:?}", config.timeout);
    println!("  Upload timeout:  {:?}", config.upload_timeout);
    println!(
        "  Retries:         {} (base {}ms)",
        config.retry.max_retries,
        config.retry.base_delay.as_millis()
    );
    println!("  Client info:     {}", config.client_info);
    println!("  Configured:      {}", yes_no(config.is_backend_configured()));
    println!("  Signed in:       {}", yes_no(connection.token.is_some()));
    if let Err(e) = config.validate() {
        println!("  {} {}", "Invalid:".red().bold(), e);
    }
    println!();
    Ok(())
}
