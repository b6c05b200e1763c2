//! CLI argument definitions.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use scrapelight_core::ApiUrl;
use scrapelight_http::{ClientConfig, RefreshPolicy};

use crate::commands::Command;

/// Base URL used when neither `--api-url` nor `SCRAPELIGHT_API_URL` is set.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Scrapelight account and session client.
#[derive(Parser, Debug)]
#[command(name = "scrapelight")]
#[command(author, version = env!("SCRAPELIGHT_VERSION"), about, long_about = None)]
pub struct Cli {
    /// API base URL
    #[arg(long, env = "SCRAPELIGHT_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    /// Let every rejected request run its own refresh exchange
    #[arg(long, global = true)]
    pub independent_refresh: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Build the client configuration from the global flags.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let base_url = ApiUrl::new(&self.api_url).context("Invalid API URL")?;

        let policy = if self.independent_refresh {
            RefreshPolicy::Independent
        } else {
            RefreshPolicy::Coalesce
        };

        Ok(ClientConfig::new(base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_refresh_policy(policy))
    }
}
