//! Change-password command implementation.

use anyhow::{Context, Result};
use clap::Args;

use scrapelight_core::PasswordChange;
use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct ChangePasswordArgs {
    /// Current password
    #[arg(long)]
    pub current: String,

    /// New password
    #[arg(long)]
    pub new: String,
}

pub async fn run(args: ChangePasswordArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;

    let reply = session
        .change_password(PasswordChange {
            current_password: args.current,
            new_password: args.new,
        })
        .await
        .context("Failed to change password")?;

    output::success(&reply.message);
    Ok(())
}
