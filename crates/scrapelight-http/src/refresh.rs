//! Credential refresh and single-replay handling for 401 responses.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use scrapelight_core::error::{ApiError, AuthError, Error};
use scrapelight_core::{CredentialPair, Result, TokenStore};

use crate::api::ApiClient;
use crate::authorizer::{Authorized, RequestAuthorizer};
use crate::config::RefreshPolicy;
use crate::request::{ApiResponse, Attempt, RequestDescriptor};

/// Where the coordinator is in the refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// No renewal in progress.
    Idle,
    /// A renewal exchange is in flight.
    Refreshing,
    /// The last renewal failed and the stored credentials were cleared.
    /// Left again once new credentials are stored.
    Exhausted,
}

type ExhaustedListener = Arc<dyn Fn() + Send + Sync>;

/// Detects authorization failures, renews credentials, and replays the
/// failed request once.
///
/// Cheap to clone (internal `Arc`); clones share state, the renewal gate,
/// and listeners.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    client: ApiClient,
    store: Arc<dyn TokenStore>,
    authorizer: RequestAuthorizer,
    policy: RefreshPolicy,
    state: RwLock<RefreshState>,
    gate: Mutex<()>,
    listeners: RwLock<Vec<ExhaustedListener>>,
}

impl RefreshCoordinator {
    pub fn new(client: ApiClient, store: Arc<dyn TokenStore>, policy: RefreshPolicy) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                authorizer: RequestAuthorizer::new(Arc::clone(&store)),
                store,
                policy,
                state: RwLock::new(RefreshState::Idle),
                gate: Mutex::new(()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Current refresh state.
    pub fn state(&self) -> RefreshState {
        *self.inner.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a callback run whenever the session becomes unrecoverable.
    ///
    /// Called after the stored credentials are cleared. The host uses this
    /// to return to its unauthenticated entry point.
    pub fn on_exhausted(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    /// Store freshly issued credentials and leave any exhausted state.
    pub fn store_credentials(&self, pair: &CredentialPair) -> Result<()> {
        self.inner.store.set(pair)?;
        self.set_state(RefreshState::Idle);
        Ok(())
    }

    /// Remove the stored credentials without signalling exhaustion.
    pub fn clear_credentials(&self) -> Result<()> {
        self.set_state(RefreshState::Idle);
        self.inner.store.clear()
    }

    /// Run a request through the full pipeline.
    ///
    /// A 401 on a protected request with stored credentials triggers one
    /// renewal and one replay; the replay's outcome is returned as if it
    /// were the first response. Every other response is returned directly,
    /// with non-success statuses mapped to [`Error::Api`].
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        let first = self.inner.authorizer.authorize(request, Attempt::FIRST)?;
        let response = self.inner.client.send(&first).await?;

        if !response.is_unauthorized() || !request.is_protected() {
            return response.into_result();
        }

        let Some(stale) = first.into_credentials() else {
            debug!("401 without stored credentials; not refreshing");
            return response.into_result();
        };

        info!("Access token rejected; refreshing credentials");
        let fresh = self.renew(&stale).await?;

        let replay = Authorized::new(request, Attempt::FIRST.next(), Some(fresh));
        let response = self.inner.client.send(&replay).await?;

        if response.is_unauthorized() {
            warn!("Request rejected again after refresh; ending session");
            self.exhaust();
            return Err(AuthError::Rejected(ApiError::from_body(401, response.body())).into());
        }

        response.into_result()
    }

    /// Renew the stored credentials now, regardless of any 401.
    #[instrument(skip(self))]
    pub async fn refresh_now(&self) -> Result<CredentialPair> {
        let _guard = match self.inner.policy {
            RefreshPolicy::Coalesce => Some(self.inner.gate.lock().await),
            RefreshPolicy::Independent => None,
        };

        let current = self
            .inner
            .store
            .get()?
            .ok_or(Error::Auth(AuthError::NotAuthenticated))?;

        self.exchange(&current).await
    }

    /// Obtain credentials newer than `stale`.
    async fn renew(&self, stale: &CredentialPair) -> Result<CredentialPair> {
        match self.inner.policy {
            RefreshPolicy::Independent => self.exchange(stale).await,
            RefreshPolicy::Coalesce => {
                let _guard = self.inner.gate.lock().await;

                match self.inner.store.get()? {
                    Some(current) if current.access_token != stale.access_token => {
                        debug!("Credentials already renewed by a concurrent request");
                        Ok(current)
                    }
                    Some(current) => self.exchange(&current).await,
                    None => {
                        debug!("Credentials cleared while waiting for renewal");
                        Err(AuthError::SessionExpired.into())
                    }
                }
            }
        }
    }

    /// Perform the renewal exchange and record its outcome.
    async fn exchange(&self, current: &CredentialPair) -> Result<CredentialPair> {
        self.set_state(RefreshState::Refreshing);

        let outcome = match self.inner.client.refresh(&current.refresh_token).await {
            Ok(pair) => self.inner.store.set(&pair).map(|()| pair),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(pair) => {
                self.set_state(RefreshState::Idle);
                info!("Credentials refreshed");
                Ok(pair)
            }
            Err(err) => {
                warn!(error = %err, "Credential refresh failed; ending session");
                self.exhaust();
                Err(AuthError::RefreshFailed {
                    source: Box::new(err),
                }
                .into())
            }
        }
    }

    /// Clear the store, mark the session exhausted, and notify listeners.
    fn exhaust(&self) {
        if let Err(err) = self.inner.store.clear() {
            warn!(error = %err, "Failed to clear stored credentials");
        }
        self.set_state(RefreshState::Exhausted);

        let listeners: Vec<ExhaustedListener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener();
        }
    }

    fn set_state(&self, state: RefreshState) {
        *self.inner.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("state", &self.state())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}
