//! Glow API CLI
//!
//! Operator tool for poking the marketplace backend through the same client
//! the web app uses: health probe, raw verbs and the resolved configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::process::ExitCode;

mod commands;
mod connection;
mod output;

use commands::request::{self, Verb};
use commands::{config, health};
use connection::Connection;

/// Talk to the Glow marketplace API
#[derive(Parser)]
#[command(name = "glow-api")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Commands,
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human-readable
    Text,
    /// Machine-readable JSON on stdout
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe backend connectivity
    Health,

    /// Send a GET request
    Get {
        /// Endpoint below /api/{version}, e.g. /products
        endpoint: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Send a POST request
    Post(BodyCommand),

    /// Send a PUT request
    Put(BodyCommand),

    /// Send a PATCH request
    Patch(BodyCommand),

    /// Send a DELETE request
    Delete {
        /// Endpoint below /api/{version}
        endpoint: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Show the resolved client configuration
    Config,
}

#[derive(Args)]
struct BodyCommand {
    /// Endpoint below /api/{version}
    endpoint: String,

    /// JSON body, or @path to read it from a file
    #[arg(short, long)]
    body: Option<String>,

    #[command(flatten)]
    request: RequestArgs,
}

/// Per-request options shared by every verb
#[derive(Args, Debug, Default)]
pub struct RequestArgs {
    /// Query parameter (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Extra header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Per-attempt deadline in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Override the configured retry budget
    #[arg(long)]
    pub retries: Option<u32>,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected NAME:VALUE, got `{raw}`"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = if cli.verbose {
        glow_telemetry::TelemetryConfig::verbose()
    } else {
        glow_telemetry::TelemetryConfig {
            log_level: "warn".to_string(),
            ..glow_telemetry::TelemetryConfig::default()
        }
    };
    if let Err(e) = glow_telemetry::init_with_config(&telemetry) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    let format = cli.format;
    let connection = &cli.connection;
    let result = match cli.command {
        Commands::Health => health::run(connection, format).await,

        Commands::Get { endpoint, request: args } => {
            request::run(connection, Verb::Get, &endpoint, None, &args, format).await
        }
        Commands::Post(cmd) => run_with_body(connection, Verb::Post, cmd, format).await,
        Commands::Put(cmd) => run_with_body(connection, Verb::Put, cmd, format).await,
        Commands::Patch(cmd) => run_with_body(connection, Verb::Patch, cmd, format).await,
        Commands::Delete { endpoint, request: args } => {
            request::run(connection, Verb::Delete, &endpoint, None, &args, format).await
        }

        Commands::Config => config::run(connection, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run_with_body(
    connection: &Connection,
    verb: Verb,
    cmd: BodyCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let body = cmd.body.as_deref().map(request::read_body).transpose()?;
    request::run(connection, verb, &cmd.endpoint, body, &cmd.request, format).await
}
