//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use scrapelight_core::LoginCredentials;
use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username or email address
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "SCRAPELIGHT_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: LoginArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;
    let credentials = LoginCredentials::new(args.username, args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let user = session.login(credentials).await.context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::user(&user);

    Ok(())
}
