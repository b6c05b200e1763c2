//! Process-wide session state for the Scrapelight client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use scrapelight_core::error::{AuthError, Error};
use scrapelight_core::{
    LoginCredentials, Message, NewAccount, PasswordChange, ProfileUpdate, Result, TokenStore,
    User,
};

use crate::api::ApiClient;
use crate::api::endpoints::{
    CHANGE_PASSWORD, LOGIN, LOGOUT, ME, REGISTER, REVOKE_TOKEN, RefreshRequest, TokenResponse,
    VALIDATE,
};
use crate::config::ClientConfig;
use crate::refresh::{RefreshCoordinator, RefreshState};
use crate::request::{ApiResponse, RequestDescriptor};

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 16;

/// Snapshot of who is logged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    /// True iff credentials are stored and the last identity fetch succeeded.
    pub is_authenticated: bool,
    /// True during the initial bootstrap and during logout.
    pub is_loading: bool,
}

impl SessionState {
    fn authenticated(&mut self, user: User) {
        self.user = Some(user);
        self.is_authenticated = true;
    }

    fn clear(&mut self) {
        self.user = None;
        self.is_authenticated = false;
    }
}

/// Lifecycle notifications for the hosting application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(User),
    LoggedOut,
    /// The session could not be renewed and was torn down; the host should
    /// return to its unauthenticated entry point.
    Expired,
}

/// The session service the rest of an application depends on.
///
/// Cheap to clone (internal `Arc`) and safe to share across tasks. State
/// changes are published on a watch channel ([`SessionContext::subscribe`])
/// and lifecycle events on a broadcast channel ([`SessionContext::events`]).
///
/// A new context starts in the loading state; call
/// [`SessionContext::initialize`] once at startup.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    coordinator: RefreshCoordinator,
    store: Arc<dyn TokenStore>,
    state: Arc<watch::Sender<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    /// Set while `logout` runs; exhaustion then ends the session quietly.
    logging_out: Arc<AtomicBool>,
}

/// Clears the logout flag however `logout` returns.
struct LogoutGuard<'a>(&'a AtomicBool);

impl<'a> LogoutGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LogoutGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionContext {
    /// Create a session bound to `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        let coordinator = RefreshCoordinator::new(client, Arc::clone(&store), config.refresh_policy);

        let (state, _) = watch::channel(SessionState {
            user: None,
            is_authenticated: false,
            is_loading: true,
        });
        let state = Arc::new(state);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let logging_out = Arc::new(AtomicBool::new(false));

        {
            let state = Arc::clone(&state);
            let events = events.clone();
            let logging_out = Arc::clone(&logging_out);
            coordinator.on_exhausted(move || {
                state.send_modify(SessionState::clear);
                if !logging_out.load(Ordering::SeqCst) {
                    let _ = events.send(SessionEvent::Expired);
                }
            });
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                coordinator,
                store,
                state,
                events,
                logging_out,
            }),
        })
    }

    // ========================================================================
    // State Access
    // ========================================================================

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Receiver for lifecycle events emitted after this call.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.coordinator.state()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Restore the session from stored credentials.
    ///
    /// Never fails: any problem leaves the session unauthenticated. Stored
    /// credentials are only destroyed when the refresh pipeline gives up on
    /// them; a network or server failure keeps them for the next start.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionState {
        self.inner.state.send_modify(|s| s.is_loading = true);

        let has_credentials = match self.inner.store.get() {
            Ok(pair) => pair.is_some(),
            Err(err) => {
                warn!(error = %err, "Could not read stored credentials");
                false
            }
        };

        if !has_credentials {
            debug!("No stored credentials");
            self.inner.state.send_modify(|s| {
                s.clear();
                s.is_loading = false;
            });
            return self.state();
        }

        match self.fetch_identity().await {
            Ok(user) => {
                info!(username = %user.username, "Session restored");
                self.inner.state.send_modify(|s| {
                    s.authenticated(user);
                    s.is_loading = false;
                });
            }
            Err(err) => {
                if err.is_auth_invalid() {
                    info!("Stored session could not be renewed");
                } else {
                    warn!(error = %err, "Identity fetch failed; keeping stored credentials");
                }
                self.inner.state.send_modify(|s| {
                    s.clear();
                    s.is_loading = false;
                });
            }
        }

        self.state()
    }

    /// Reset the in-memory session without touching stored credentials.
    pub fn dispose(&self) {
        debug!("Disposing session");
        self.inner.state.send_replace(SessionState::default());
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns the server's failure (e.g. incorrect password) and leaves the
    /// session unauthenticated without modifying stored credentials. If the
    /// identity fetch that follows a successful exchange fails, the new
    /// credentials are discarded.
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn login(&self, credentials: LoginCredentials) -> Result<User> {
        info!("Logging in");

        let request = RequestDescriptor::post(LOGIN)
            .public()
            .with_json(&credentials)?;
        let tokens: TokenResponse = match self
            .inner
            .coordinator
            .execute(&request)
            .await
            .and_then(|response| response.json())
        {
            Ok(tokens) => tokens,
            Err(err) => {
                self.inner.state.send_modify(SessionState::clear);
                return Err(err);
            }
        };

        self.inner.coordinator.store_credentials(&tokens.into_pair())?;

        let user = match self.fetch_identity().await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Identity fetch after login failed");
                if let Err(clear_err) = self.inner.coordinator.clear_credentials() {
                    warn!(error = %clear_err, "Failed to discard credentials");
                }
                self.inner.state.send_modify(SessionState::clear);
                return Err(err);
            }
        };

        self.publish_login(&user);
        debug!("Login complete");
        Ok(user)
    }

    /// Create an account, then log in with the same credentials.
    #[instrument(skip(self, account), fields(username = %account.username()))]
    pub async fn register(&self, account: NewAccount) -> Result<User> {
        info!("Registering account");

        let request = RequestDescriptor::post(REGISTER)
            .public()
            .with_json(&account)?;
        let created: User = self.inner.coordinator.execute(&request).await?.json()?;
        debug!(user_id = created.id, "Account created");

        self.login(account.login_credentials()).await
    }

    /// End the session.
    ///
    /// Revokes the refresh token, then invalidates the access token. Both
    /// server calls go through the refresh pipeline, so an expired access
    /// token is renewed first; both are best effort. Stored credentials and
    /// in-memory state are cleared whatever they return, and only
    /// [`SessionEvent::LoggedOut`] is emitted, even if renewal fails.
    ///
    /// # Errors
    ///
    /// Returns an error only if the token store could not be cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        info!("Logging out");
        let _guard = LogoutGuard::enter(&self.inner.logging_out);
        self.inner.state.send_modify(|s| s.is_loading = true);

        if self.has_credentials() {
            match self.revoke_refresh_token().await {
                Ok(_) => debug!("Refresh token revoked"),
                Err(err) => warn!(error = %err, "Refresh token revocation failed; clearing locally"),
            }
        }

        // A failed renewal above has already cleared the store.
        if self.has_credentials() {
            match self.execute(&RequestDescriptor::post(LOGOUT)).await {
                Ok(_) => debug!("Server-side logout succeeded"),
                Err(err) => warn!(error = %err, "Server-side logout failed; clearing locally"),
            }
        }

        let cleared = self.inner.coordinator.clear_credentials();

        self.inner.state.send_modify(|s| {
            s.clear();
            s.is_loading = false;
        });
        let _ = self.inner.events.send(SessionEvent::LoggedOut);

        cleared
    }

    /// Re-fetch the current identity.
    ///
    /// Returns `Ok(None)` when not authenticated. On failure the in-memory
    /// session is cleared; stored credentials are only destroyed if the
    /// refresh pipeline exhausted them.
    #[instrument(skip(self))]
    pub async fn refresh_user(&self) -> Result<Option<User>> {
        if !self.is_authenticated() {
            return Ok(None);
        }

        match self.fetch_identity().await {
            Ok(user) => {
                self.inner
                    .state
                    .send_modify(|s| s.authenticated(user.clone()));
                Ok(Some(user))
            }
            Err(err) => {
                warn!(error = %err, "Identity refresh failed");
                self.inner.state.send_modify(SessionState::clear);
                Err(err)
            }
        }
    }

    /// Revoke the stored refresh token on the server.
    ///
    /// The local store is left as is; [`SessionContext::logout`] calls this
    /// before clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] if no credentials are stored.
    #[instrument(skip(self))]
    pub async fn revoke_refresh_token(&self) -> Result<Message> {
        let pair = self
            .inner
            .store
            .get()?
            .ok_or(Error::Auth(AuthError::NotAuthenticated))?;

        let request = RequestDescriptor::post(REVOKE_TOKEN).with_json(&RefreshRequest {
            refresh_token: pair.refresh_token.as_str(),
        })?;
        self.execute(&request).await?.json()
    }

    /// Renew the stored credentials immediately.
    #[instrument(skip(self))]
    pub async fn refresh_credentials(&self) -> Result<()> {
        self.inner.coordinator.refresh_now().await.map(|_| ())
    }

    // ========================================================================
    // Protected Operations
    // ========================================================================

    /// Update the account profile and replace the session's user.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let request = RequestDescriptor::put(ME).with_json(&update)?;
        let user: User = self.execute(&request).await?.json()?;

        self.inner.state.send_modify(|s| {
            if s.is_authenticated {
                s.user = Some(user.clone());
            }
        });
        Ok(user)
    }

    #[instrument(skip(self, change))]
    pub async fn change_password(&self, change: PasswordChange) -> Result<Message> {
        let request = RequestDescriptor::post(CHANGE_PASSWORD).with_json(&change)?;
        self.execute(&request).await?.json()
    }

    /// Ask the server whether the current access token is accepted.
    #[instrument(skip(self))]
    pub async fn validate(&self) -> Result<Message> {
        self.execute(&RequestDescriptor::get(VALIDATE)).await?.json()
    }

    /// Run any request through the authorize/refresh pipeline.
    ///
    /// This is the entry point for calls outside the auth API, such as
    /// search or saved items.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        self.inner.coordinator.execute(request).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn has_credentials(&self) -> bool {
        matches!(self.inner.store.get(), Ok(Some(_)))
    }

    async fn fetch_identity(&self) -> Result<User> {
        self.inner
            .coordinator
            .execute(&RequestDescriptor::get(ME))
            .await?
            .json()
    }

    fn publish_login(&self, user: &User) {
        info!(username = %user.username, "Logged in");
        self.inner
            .state
            .send_modify(|s| s.authenticated(user.clone()));
        let _ = self.inner.events.send(SessionEvent::LoggedIn(user.clone()));
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.inner.state.borrow())
            .field("coordinator", &self.inner.coordinator)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}
