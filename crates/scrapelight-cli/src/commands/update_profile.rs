//! Update-profile command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;

use scrapelight_core::ProfileUpdate;
use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct UpdateProfileArgs {
    /// New email address
    #[arg(long)]
    pub email: Option<String>,

    /// New username
    #[arg(long)]
    pub username: Option<String>,
}

pub async fn run(args: UpdateProfileArgs, config: ClientConfig) -> Result<()> {
    let update = ProfileUpdate {
        email: args.email,
        username: args.username,
    };
    if update.is_empty() {
        bail!("Nothing to update; pass --email and/or --username");
    }

    let session = storage::open(config)?;
    let user = session
        .update_profile(update)
        .await
        .context("Failed to update profile")?;

    output::success("Profile updated");
    output::user(&user);

    Ok(())
}
