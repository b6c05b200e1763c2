//! Whoami command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;

use scrapelight_core::TokenStore;
use scrapelight_http::ClientConfig;

use crate::output;
use crate::storage;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the account as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: WhoamiArgs, config: ClientConfig) -> Result<()> {
    let session = storage::open(config)?;
    let state = session.initialize().await;

    let Some(user) = state.user else {
        let stored = storage::token_store()?
            .get()
            .context("Failed to read stored session")?;
        if stored.is_some() {
            bail!("Could not load the account; the stored session was kept. Try again with -v for details.");
        }
        bail!("No active session. Run 'scrapelight login' first.");
    };

    if args.json {
        return output::json_pretty(&user);
    }

    output::user(&user);

    if let Some(pair) = storage::token_store()?.get()? {
        let status = match pair.expires_at() {
            Some(at) if pair.is_expired() => format!("expired at {}", output::timestamp(at)),
            Some(at) => format!("valid until {}", output::timestamp(at)),
            None => "expiry unknown".to_string(),
        };
        output::field("Access token", &status);
    }

    Ok(())
}
