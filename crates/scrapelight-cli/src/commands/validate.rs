//! Validate command implementation.

use anyhow::{Context, Result};
use clap::Args;

use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct ValidateArgs {}

pub async fn run(_args: ValidateArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;

    let reply = session
        .validate()
        .await
        .context("Session is not valid")?;

    output::success(&reply.message);
    if let Some(detail) = reply.detail {
        output::field("Detail", &detail);
    }

    Ok(())
}
