//! Request descriptors, attempt counting, and raw responses.

use std::fmt;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use scrapelight_core::error::{ApiError, Error, InvalidInputError};
use scrapelight_core::Result;

/// Whether a request participates in credential refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Credential exchanges (login, register). A 401 is a plain failure.
    Public,
    /// Requires a valid access token; a 401 triggers refresh-and-replay.
    Protected,
}

/// An immutable description of one API call.
///
/// Descriptors carry no retry state; the pipeline pairs each dispatch with
/// an [`Attempt`] instead, so the same descriptor can be replayed verbatim.
#[derive(Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    access: Access,
}

impl RequestDescriptor {
    /// A protected request with no query and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            access: Access::Protected,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Mark the request as a public credential exchange.
    pub fn public(mut self) -> Self {
        self.access = Access::Public;
        self
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| InvalidInputError::Body {
            message: e.to_string(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_protected(&self) -> bool {
        self.access == Access::Protected
    }
}

// Bodies may hold passwords or refresh tokens.
impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body.as_ref().map(|_| "[REDACTED]"))
            .field("access", &self.access)
            .finish()
    }
}

/// Which dispatch of a descriptor this is.
///
/// The pipeline only ever produces [`Attempt::FIRST`] and its single
/// successor; a replay is never replayed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);

impl Attempt {
    pub const FIRST: Attempt = Attempt(1);

    /// The following attempt.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns true for any dispatch after the first.
    pub fn is_replay(self) -> bool {
        self.0 > 1
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Turn a non-success status into [`Error::Api`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Api(ApiError::from_body(self.status, &self.body)))
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Decode {
            message: e.to_string(),
        })
    }
}
