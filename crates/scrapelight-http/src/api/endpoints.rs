//! Endpoint paths and wire types for the authentication API.

use serde::{Deserialize, Serialize};

use scrapelight_core::{AccessToken, CredentialPair, RefreshToken};

// ============================================================================
// Endpoint Paths
// ============================================================================

/// Exchange username/email and password for a credential pair.
pub const LOGIN: &str = "/auth/login";

/// Create an account.
pub const REGISTER: &str = "/auth/register";

/// Exchange a refresh token for a new credential pair.
pub const REFRESH: &str = "/auth/refresh";

/// Current identity (GET) and profile update (PUT).
pub const ME: &str = "/auth/me";

pub const CHANGE_PASSWORD: &str = "/auth/change-password";

/// Server-side invalidation of the current access token.
pub const LOGOUT: &str = "/auth/logout";

/// Server-side invalidation of a refresh token (protected; token in body).
pub const REVOKE_TOKEN: &str = "/auth/revoke-token";

/// Check that the current access token is accepted.
pub const VALIDATE: &str = "/auth/validate";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the refresh exchange and for revocation.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from login and refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    pub fn into_pair(self) -> CredentialPair {
        CredentialPair::new(
            AccessToken::new(self.access_token),
            RefreshToken::new(self.refresh_token),
            self.token_type,
            self.expires_in,
        )
    }
}
