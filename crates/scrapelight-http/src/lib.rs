//! scrapelight-http - HTTP session layer for the Scrapelight API.
//!
//! Every outgoing request flows through the same pipeline: the
//! [`RequestAuthorizer`] stamps the stored access token, the [`ApiClient`]
//! sends it, and the [`RefreshCoordinator`] intercepts a 401 to renew the
//! credentials and replay the request once. [`SessionContext`] wraps the
//! pipeline and is the only type an application needs to hold.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use scrapelight_core::{ApiUrl, LoginCredentials, MemoryTokenStore};
//! use scrapelight_http::{ClientConfig, SessionContext};
//!
//! # async fn example() -> Result<(), scrapelight_core::Error> {
//! let config = ClientConfig::new(ApiUrl::new("https://api.scrapelight.app")?);
//! let session = SessionContext::new(config, Arc::new(MemoryTokenStore::new()))?;
//! session.initialize().await;
//!
//! let user = session.login(LoginCredentials::new("alice", "hunter22")).await?;
//! println!("Logged in as {}", user.username);
//! # Ok(())
//! # }
//! ```

mod api;
mod authorizer;
mod config;
mod refresh;
mod request;
mod session;

pub use api::{ApiClient, endpoints};
pub use authorizer::{Authorized, RequestAuthorizer};
pub use config::{ClientConfig, RefreshPolicy};
pub use refresh::{RefreshCoordinator, RefreshState};
pub use request::{Access, ApiResponse, Attempt, RequestDescriptor};
pub use session::{SessionContext, SessionEvent, SessionState};
