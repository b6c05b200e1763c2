//! Filesystem storage for the credential pair.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use scrapelight_core::error::{Error, StorageError};
use scrapelight_core::{AccessToken, CredentialPair, RefreshToken, Result, TokenStore};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// On-disk document.
///
/// Every field is optional on read so that a document missing either token
/// key is treated as logged out rather than as corruption.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    obtained_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    fn from_pair(pair: &CredentialPair) -> Self {
        Self {
            access_token: Some(pair.access_token.as_str().to_string()),
            refresh_token: Some(pair.refresh_token.as_str().to_string()),
            token_type: Some(pair.token_type.clone()),
            expires_in: Some(pair.expires_in),
            obtained_at: Some(pair.obtained_at),
        }
    }

    fn into_pair(self) -> Option<CredentialPair> {
        let (Some(access), Some(refresh)) = (self.access_token, self.refresh_token) else {
            return None;
        };

        Some(CredentialPair {
            access_token: AccessToken::new(access),
            refresh_token: RefreshToken::new(refresh),
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_in: self.expires_in.unwrap_or(3600),
            obtained_at: self.obtained_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Token store persisted as a JSON file.
///
/// Survives process restarts: a fresh instance pointed at the same path
/// sees whatever the previous instance stored.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by the file at `path`.
    ///
    /// The file and its parent directory are created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn io_error(&self, err: std::io::Error) -> Error {
        Error::Storage(StorageError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })
    }

    /// Run `f` while holding an exclusive lock on the sibling lock file.
    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| self.io_error(e))?;

        lock_file.lock_exclusive().map_err(|e| self.io_error(e))?;
        let result = f();
        lock_file.unlock().map_err(|e| self.io_error(e))?;

        result
    }

    fn write_document(&self, doc: &StoredTokens) -> Result<()> {
        let json = serde_json::to_string_pretty(doc).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })?;

        let tmp = self.tmp_path();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        // Owner-only from creation; tokens are never readable by others.
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).map_err(|e| self.io_error(e))?;

        // A leftover temp file keeps its old mode; tighten it before writing.
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| self.io_error(e))?;

        file.write_all(json.as_bytes())
            .map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;

        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

impl TokenStore for FileTokenStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn get(&self) -> Result<Option<CredentialPair>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("No token document");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let doc: StoredTokens = serde_json::from_str(&json).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })?;

        Ok(doc.into_pair())
    }

    #[instrument(skip(self, pair), fields(path = %self.path.display()))]
    fn set(&self, pair: &CredentialPair) -> Result<()> {
        self.with_lock(|| self.write_document(&StoredTokens::from_pair(pair)))?;
        debug!("Stored credential pair");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<()> {
        self.with_lock(|| match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        })?;
        debug!("Cleared credential pair");
        Ok(())
    }
}
