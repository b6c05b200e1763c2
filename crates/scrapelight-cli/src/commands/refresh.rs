//! Refresh command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use scrapelight_core::TokenStore;
use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(_args: RefreshArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    session
        .refresh_credentials()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    if let Some(at) = storage::token_store()?.get()?.and_then(|pair| pair.expires_at()) {
        output::field("Valid until", &output::timestamp(at));
    }

    Ok(())
}
