//! Request authorization stage.

use std::sync::Arc;

use tracing::trace;

use scrapelight_core::{AccessToken, CredentialPair, Result, TokenStore};

use crate::request::{Attempt, RequestDescriptor};

/// A descriptor ready for dispatch, paired with the credentials it carries.
///
/// Keeping the attached pair alongside the request lets the refresh stage
/// tell which access token a 401 was issued for.
#[derive(Debug)]
pub struct Authorized<'a> {
    request: &'a RequestDescriptor,
    attempt: Attempt,
    credentials: Option<CredentialPair>,
}

impl<'a> Authorized<'a> {
    pub(crate) fn new(
        request: &'a RequestDescriptor,
        attempt: Attempt,
        credentials: Option<CredentialPair>,
    ) -> Self {
        Self {
            request,
            attempt,
            credentials,
        }
    }

    pub fn request(&self) -> &RequestDescriptor {
        self.request
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The bearer token to send, if any.
    pub fn bearer(&self) -> Option<&AccessToken> {
        self.credentials.as_ref().map(|pair| &pair.access_token)
    }

    pub fn credentials(&self) -> Option<&CredentialPair> {
        self.credentials.as_ref()
    }

    pub(crate) fn into_credentials(self) -> Option<CredentialPair> {
        self.credentials
    }
}

/// Stamps outgoing requests with the stored access token.
#[derive(Clone)]
pub struct RequestAuthorizer {
    store: Arc<dyn TokenStore>,
}

impl RequestAuthorizer {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Attach the stored access token, if one exists.
    ///
    /// Without a stored pair the request goes out unauthenticated.
    pub fn authorize<'a>(
        &self,
        request: &'a RequestDescriptor,
        attempt: Attempt,
    ) -> Result<Authorized<'a>> {
        let credentials = self.store.get()?;
        trace!(
            path = request.path(),
            %attempt,
            authenticated = credentials.is_some(),
            "Authorizing request"
        );
        Ok(Authorized::new(request, attempt, credentials))
    }
}

impl std::fmt::Debug for RequestAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthorizer").finish_non_exhaustive()
    }
}
