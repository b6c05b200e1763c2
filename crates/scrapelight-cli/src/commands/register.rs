//! Register command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use scrapelight_core::NewAccount;
use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Username for the new account
    #[arg(long)]
    pub username: String,

    /// Email address for the new account
    #[arg(long)]
    pub email: String,

    /// Password for the new account
    #[arg(long, env = "SCRAPELIGHT_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: RegisterArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;
    let account = NewAccount::new(args.username, args.email, args.password);

    eprintln!("{}", "Creating account...".dimmed());

    let user = session
        .register(account)
        .await
        .context("Failed to register")?;

    output::success("Account created and logged in");
    println!();
    output::user(&user);

    Ok(())
}
