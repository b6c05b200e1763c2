//! Client configuration.

use std::time::Duration;

use scrapelight_core::ApiUrl;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How concurrent credential renewals are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Concurrent 401s for the same access token share one renewal exchange.
    #[default]
    Coalesce,
    /// Every 401 issues its own renewal exchange.
    Independent,
}

/// Configuration for [`SessionContext`](crate::SessionContext) and
/// [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the endpoint paths are joined to.
    pub base_url: ApiUrl,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    pub refresh_policy: RefreshPolicy,
}

impl ClientConfig {
    /// Configuration with default timeout, user agent, and refresh policy.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("scrapelight/", env!("CARGO_PKG_VERSION")).to_string(),
            refresh_policy: RefreshPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }
}
