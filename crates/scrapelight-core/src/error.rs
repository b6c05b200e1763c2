//! Error types for the Scrapelight client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, API status, authentication, storage, and input errors.

use std::fmt;
use thiserror::Error;

/// Message shown when a failure carries no human-readable detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// The unified error type for Scrapelight client operations.
///
/// Expired-but-renewable sessions never surface here; they are recovered
/// inside the request pipeline. Everything else reaches the caller as one
/// of these variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The session could not be kept alive and was torn down.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The token store could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (bad URL, unserializable body).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// A success response whose body did not match the expected shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl Error {
    /// Returns true if this error ended the session (forced logout).
    pub fn is_auth_invalid(&self) -> bool {
        matches!(
            self,
            Error::Auth(
                AuthError::RefreshFailed { .. } | AuthError::Rejected(_) | AuthError::SessionExpired
            )
        )
    }

    /// Returns the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) | Error::Auth(AuthError::Rejected(err)) => Some(err.status),
            Error::Auth(AuthError::RefreshFailed { source }) => source.status(),
            _ => None,
        }
    }

    /// A message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api(err) => err.message().to_string(),
            Error::Auth(AuthError::Rejected(err)) => err.message().to_string(),
            Error::Auth(AuthError::RefreshFailed { source }) => source.user_message(),
            Error::Auth(AuthError::SessionExpired) => {
                "Your session has expired. Please log in again.".to_string()
            }
            Error::Auth(AuthError::NotAuthenticated) => "You are not logged in.".to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication failures that end the session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The renewal exchange failed; the stored credentials were cleared.
    #[error("credential refresh failed: {source}")]
    RefreshFailed { source: Box<Error> },

    /// The request was rejected again after a successful renewal.
    #[error("request rejected after refresh: {0}")]
    Rejected(ApiError),

    /// Another task's renewal failed while this request waited for it.
    #[error("session expired")]
    SessionExpired,

    /// No credentials are stored.
    #[error("not authenticated")]
    NotAuthenticated,
}

/// Coarse classification of an API failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 400 or 422.
    Validation,
    /// 401.
    Unauthorized,
    /// 403.
    Forbidden,
    /// 404.
    NotFound,
    /// 409.
    Conflict,
    /// 5xx.
    Server,
    /// Anything else.
    Other,
}

/// A non-success response from the API.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Human-readable detail from the server (if present).
    pub detail: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, detail: Option<String>) -> Self {
        Self { status, detail }
    }

    /// Parse an error body of the form `{"detail": ...}`.
    ///
    /// `detail` may be a string or a list of validation entries carrying a
    /// `msg` field; anything else yields no detail.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let detail = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| extract_detail(&value));
        Self::new(status, detail)
    }

    /// Classify the status code.
    pub fn kind(&self) -> FailureKind {
        match self.status {
            400 | 422 => FailureKind::Validation,
            401 => FailureKind::Unauthorized,
            403 => FailureKind::Forbidden,
            404 => FailureKind::NotFound,
            409 => FailureKind::Conflict,
            500..=599 => FailureKind::Server,
            _ => FailureKind::Other,
        }
    }

    /// Check if this is an authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// The server's detail message, or the generic fallback.
    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE)
    }
}

fn extract_detail(value: &serde_json::Value) -> Option<String> {
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

/// Token store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// The persisted document could not be parsed.
    #[error("corrupt token document at {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// A request body could not be serialized.
    #[error("invalid request body: {message}")]
    Body { message: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
