//! Session storage for persisting login state between invocations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use scrapelight_file::FileTokenStore;
use scrapelight_http::{ClientConfig, SessionContext};

/// Get the session file path.
fn session_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "scrapelight").context("Could not determine data directory")?;

    Ok(dirs.data_dir().join("session.json"))
}

/// The token store shared by every command.
pub fn token_store() -> Result<FileTokenStore> {
    Ok(FileTokenStore::new(session_path()?))
}

/// Open a session backed by the on-disk token store.
///
/// The session is not initialized; commands that need the current
/// identity call [`SessionContext::initialize`] themselves.
pub fn open(config: ClientConfig) -> Result<SessionContext> {
    let store = token_store()?;
    tracing::debug!(path = %store.path().display(), "Using token store");

    SessionContext::new(config, Arc::new(store)).context("Failed to create API client")
}
