//! HTTP client implementation.

use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{debug, instrument, trace};

use scrapelight_core::error::{Error, InvalidInputError};
use scrapelight_core::{ApiUrl, CredentialPair, RefreshToken, Result};

use crate::authorizer::Authorized;
use crate::config::ClientConfig;
use crate::request::ApiResponse;

use super::endpoints::{REFRESH, RefreshRequest, TokenResponse};

/// HTTP client for the Scrapelight API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: ApiUrl,
}

impl ApiClient {
    /// Create a new client from `config`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Returns the base URL this client is configured for.
    pub fn base_url(&self) -> &ApiUrl {
        &self.base_url
    }

    /// Dispatch an authorized request and read the whole response.
    ///
    /// Any HTTP status is returned as a response; only transport failures
    /// are errors here.
    #[instrument(skip(self, authorized), fields(
        method = %authorized.request().method(),
        path = authorized.request().path(),
        attempt = %authorized.attempt(),
    ))]
    pub async fn send(&self, authorized: &Authorized<'_>) -> Result<ApiResponse> {
        let request = authorized.request();
        let url = self.base_url.endpoint(request.path());
        debug!(
            authenticated = authorized.bearer().is_some(),
            replay = authorized.attempt().is_replay(),
            "API request"
        );

        let mut builder = self.client.request(request.method().clone(), &url);

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(token) = authorized.bearer() {
            builder = builder.header(AUTHORIZATION, bearer_header(token.as_str())?);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        trace!(status, bytes = body.len(), "API response");

        Ok(ApiResponse::new(status, body))
    }

    /// Exchange a refresh token for a new credential pair.
    ///
    /// The refresh token travels in the body; no authorization header is sent.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<CredentialPair> {
        let url = self.base_url.endpoint(REFRESH);
        debug!("Refresh exchange");

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.as_str(),
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        trace!(status, "Refresh response");

        let tokens: TokenResponse = ApiResponse::new(status, body).into_result()?.json()?;
        Ok(tokens.into_pair())
    }
}

fn bearer_header(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        Error::InvalidInput(InvalidInputError::Other {
            message: "access token contains characters not allowed in a header".to_string(),
        })
    })
}
