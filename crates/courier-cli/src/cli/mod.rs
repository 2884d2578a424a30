//! CLI for the courier API client.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use courier_core::config;

use commands::{run_classify, run_config, run_request};

/// Top-level CLI for courier.
#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(about = "courier: resilient API client with retries and a stable error taxonomy", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Options for `courier request`.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Path relative to the configured base URL, or an absolute http(s) URL.
    pub path: String,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// JSON request body.
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header as "Name: value" (repeatable).
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Bearer token (defaults to $COURIER_TOKEN).
    #[arg(long)]
    pub token: Option<String>,

    /// Label prefixed to the error message, e.g. "Saving profile".
    #[arg(long)]
    pub context: Option<String>,

    /// Override the configured base URL.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the maximum number of attempts.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Override the base backoff delay in milliseconds.
    #[arg(long, value_name = "MS")]
    pub base_delay_ms: Option<u64>,

    /// Print the structured log record of a failure as JSON.
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send a request through the retrying pipeline and print the response body.
    Request(RequestArgs),

    /// Show how a status code (or a missing response) is classified.
    Classify {
        /// HTTP status; omit to classify a failure with no response.
        #[arg(long)]
        status: Option<u16>,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Request(args) => run_request(&cfg, args).await?,
            CliCommand::Classify { status } => run_classify(status),
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
