//! Token types for Scrapelight authentication.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An access token for authenticated API requests.
///
/// Access tokens are short-lived bearer credentials.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in authorization headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP authorization headers or persisting.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// A refresh token for obtaining new credential pairs.
///
/// Refresh tokens are longer-lived and used only against the renewal
/// endpoint.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Create a new refresh token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in renewal requests.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

macro_rules! string_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer).map(Self)
            }
        }
    };
}

string_serde!(AccessToken);
string_serde!(RefreshToken);

fn default_token_type() -> String {
    "bearer".to_string()
}

fn default_expires_in() -> i64 {
    3600
}

/// The access/refresh token pair issued by login or renewal.
///
/// Both tokens are mandatory fields, so a pair can never hold one token
/// without the other. `obtained_at` is stamped locally when the pair is
/// received and is not part of the server's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default = "Utc::now")]
    pub obtained_at: DateTime<Utc>,
}

impl CredentialPair {
    /// Create a pair stamped with the current time.
    pub fn new(
        access_token: AccessToken,
        refresh_token: RefreshToken,
        token_type: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: token_type.into(),
            expires_in,
            obtained_at: Utc::now(),
        }
    }

    /// When the access token is expected to expire.
    ///
    /// `None` if `expires_in` puts the expiry outside the representable
    /// date range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        TimeDelta::try_seconds(self.expires_in)
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
    }

    /// Whether the access token is past its advertised lifetime.
    ///
    /// Informational only; the server's 401 is what triggers renewal. An
    /// unrepresentable expiry counts as expired only for negative lifetimes.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(at) => Utc::now() >= at,
            None => self.expires_in < 0,
        }
    }
}
