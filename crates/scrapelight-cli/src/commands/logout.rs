//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;

    session
        .logout()
        .await
        .context("Failed to remove stored session")?;

    output::success("Logged out");
    Ok(())
}
