//! Mock API tests for the session layer.
//!
//! These tests use wiremock to simulate the Scrapelight API and exercise the
//! authorize/send/refresh pipeline without network access.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use scrapelight_core::error::{AuthError, Error, FailureKind};
use scrapelight_core::{
    AccessToken, ApiUrl, CredentialPair, LoginCredentials, MemoryTokenStore, NewAccount,
    PasswordChange, ProfileUpdate, RefreshToken, TokenStore,
};
use scrapelight_file::FileTokenStore;
use scrapelight_http::{
    ClientConfig, RefreshPolicy, RefreshState, RequestDescriptor, SessionContext, SessionEvent,
};

// ============================================================================
// Helpers
// ============================================================================

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(ApiUrl::new(server.uri()).unwrap())
}

fn session_with(server: &MockServer, store: Arc<dyn TokenStore>) -> SessionContext {
    SessionContext::new(config(server), store).unwrap()
}

fn pair(access: &str, refresh: &str) -> CredentialPair {
    CredentialPair::new(
        AccessToken::new(access),
        RefreshToken::new(refresh),
        "bearer",
        3600,
    )
}

fn user_body(username: &str) -> serde_json::Value {
    json!({
        "id": 42,
        "username": username,
        "email": format!("{}@example.com", username),
        "is_active": true,
        "is_verified": true,
        "created_at": "2024-05-01T09:30:00+00:00",
        "last_login": "2024-06-01T12:00:00"
    })
}

fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 3600
    })
}

async fn mount_login(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, refresh)))
        .mount(server)
        .await;
}

async fn mount_me(server: &MockServer, access: &str, username: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body(username)))
        .mount(server)
        .await;
}

fn no_authorization(request: &Request) -> bool {
    !request.headers.contains_key("authorization")
}

// ============================================================================
// Login / Register
// ============================================================================

#[tokio::test]
async fn test_login_populates_store_and_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "secret123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "access-1", "alice").await;

    let store = MemoryTokenStore::new();
    let session = session_with(&server, Arc::new(store.clone()));
    session.initialize().await;
    let mut events = session.events();

    let user = session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();

    assert_eq!(user.username, "alice");
    let state = session.state();
    assert!(state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(state.user.as_ref(), Some(&user));

    let stored = store.get().unwrap().unwrap();
    assert_eq!(stored.access_token.as_str(), "access-1");
    assert_eq!(stored.refresh_token.as_str(), "refresh-1");

    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn(user));
}

#[tokio::test]
async fn test_login_invalid_credentials_leaves_store_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Incorrect username/email or password"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("x", "y")))
        .expect(0)
        .mount(&server)
        .await;

    // A stale pair from an earlier session must not be refreshed or removed.
    let store = MemoryTokenStore::with_pair(pair("stale", "stale-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));

    let err = session
        .login(LoginCredentials::new("alice", "wrong"))
        .await
        .unwrap_err();

    match &err {
        Error::Api(api) => {
            assert_eq!(api.status, 401);
            assert_eq!(api.message(), "Incorrect username/email or password");
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert!(!session.is_authenticated());
    let stored = store.get().unwrap().unwrap();
    assert_eq!(stored.access_token.as_str(), "stale");
    assert_eq!(stored.refresh_token.as_str(), "stale-refresh");
}

#[tokio::test]
async fn test_login_identity_failure_discards_credentials() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = session_with(&server, Arc::new(store.clone()));

    let err = session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(store.get().unwrap().is_none());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_register_then_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "secret123"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(user_body("bob")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "bob", "password": "secret123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-b", "refresh-b")))
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "access-b", "bob").await;

    let session = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let user = session
        .register(NewAccount::new("bob", "bob@example.com", "secret123"))
        .await
        .unwrap();

    assert_eq!(user.username, "bob");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_register_conflict_propagates_without_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Email already registered"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = session_with(&server, Arc::new(store.clone()));
    let err = session
        .register(NewAccount::new("bob", "bob@example.com", "secret123"))
        .await
        .unwrap_err();

    match err {
        Error::Api(api) => {
            assert_eq!(api.kind(), FailureKind::Validation);
            assert_eq!(api.message(), "Email already registered");
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert!(store.get().unwrap().is_none());
    assert!(!session.is_authenticated());
}

// ============================================================================
// Refresh Coordination
// ============================================================================

#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_replayed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer expired-access"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refresh_token": "valid-refresh"})))
        .and(no_authorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "fresh-access",
            "valid-refresh",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body("alice")))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "valid-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));

    let response = session
        .execute(&RequestDescriptor::get("/auth/me"))
        .await
        .unwrap();
    let body: serde_json::Value = response.json().unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(body["username"], "alice");
    assert_eq!(
        store.get().unwrap().unwrap().access_token.as_str(),
        "fresh-access"
    );
    assert_eq!(session.refresh_state(), RefreshState::Idle);
}

#[tokio::test]
async fn test_initialize_recovers_expired_session_silently() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer expired-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "fresh-access",
            "valid-refresh",
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "fresh-access", "alice").await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "valid-refresh"));
    let session = session_with(&server, Arc::new(store));
    let mut events = session.events();

    let state = session.initialize().await;

    assert!(state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(state.user.unwrap().username, "alice");
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_request_is_never_attempted_three_times() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "fresh-access",
            "valid-refresh",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "valid-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));
    let mut events = session.events();

    let err = session
        .execute(&RequestDescriptor::get("/saved-items"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::Rejected(_))));
    assert!(err.is_auth_invalid());
    assert!(store.get().unwrap().is_none());
    assert_eq!(session.refresh_state(), RefreshState::Exhausted);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
}

#[tokio::test]
async fn test_failed_refresh_forces_logout() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    mount_me(&server, "access-1", "alice").await;
    Mock::given(method("GET"))
        .and(path("/search/history"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Invalid or expired refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = session_with(&server, Arc::new(store.clone()));
    session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();
    let mut events = session.events();

    let err = session
        .execute(&RequestDescriptor::get("/search/history"))
        .await
        .unwrap_err();

    match &err {
        Error::Auth(AuthError::RefreshFailed { source }) => {
            assert_eq!(source.status(), Some(401));
            assert_eq!(source.user_message(), "Invalid or expired refresh token");
        }
        other => panic!("expected refresh failure, got {:?}", other),
    }
    assert!(store.get().unwrap().is_none());
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert_eq!(session.refresh_state(), RefreshState::Exhausted);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
}

#[tokio::test]
async fn test_login_after_exhaustion_returns_to_idle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer dead-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    mount_login(&server, "access-2", "refresh-2").await;
    mount_me(&server, "access-2", "alice").await;

    let store = MemoryTokenStore::with_pair(pair("dead-access", "dead-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));

    let state = session.initialize().await;
    assert!(!state.is_authenticated);
    assert_eq!(session.refresh_state(), RefreshState::Exhausted);
    assert!(store.get().unwrap().is_none());

    session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();
    assert_eq!(session.refresh_state(), RefreshState::Idle);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_unauthorized_without_credentials_is_not_refreshed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .and(no_authorization)
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Not authenticated"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let err = session
        .execute(&RequestDescriptor::get("/saved-items"))
        .await
        .unwrap_err();

    match err {
        Error::Api(api) => assert_eq!(api.message(), "Not authenticated"),
        other => panic!("expected API error, got {:?}", other),
    }
    assert_eq!(session.refresh_state(), RefreshState::Idle);
}

#[tokio::test]
async fn test_concurrent_expiry_shares_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .and(header("authorization", "Bearer expired-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("fresh-access", "valid-refresh"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "valid-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));
    let request = RequestDescriptor::get("/saved-items");

    let results = join_all((0..5).map(|_| session.execute(&request))).await;

    for result in results {
        assert_eq!(result.unwrap().status(), 200);
    }
    assert_eq!(
        store.get().unwrap().unwrap().access_token.as_str(),
        "fresh-access"
    );
}

#[tokio::test]
async fn test_concurrent_expiry_with_failed_refresh_expires_waiters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Invalid or expired refresh token"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "revoked-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));
    let mut events = session.events();
    let request = RequestDescriptor::get("/saved-items");

    let results = join_all((0..4).map(|_| session.execute(&request))).await;

    let mut refresh_failed = 0;
    let mut session_expired = 0;
    for result in results {
        match result.unwrap_err() {
            Error::Auth(AuthError::RefreshFailed { .. }) => refresh_failed += 1,
            Error::Auth(AuthError::SessionExpired) => session_expired += 1,
            other => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(refresh_failed, 1);
    assert_eq!(session_expired, 3);

    assert!(store.get().unwrap().is_none());
    assert_eq!(session.refresh_state(), RefreshState::Exhausted);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_independent_policy_refreshes_per_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .and(header("authorization", "Bearer expired-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/saved-items"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("fresh-access", "valid-refresh"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "valid-refresh"));
    let session = SessionContext::new(
        config(&server).with_refresh_policy(RefreshPolicy::Independent),
        Arc::new(store),
    )
    .unwrap();
    let request = RequestDescriptor::get("/saved-items");

    let (first, second) = tokio::join!(session.execute(&request), session.execute(&request));

    assert_eq!(first.unwrap().status(), 200);
    assert_eq!(second.unwrap().status(), 200);
}

// ============================================================================
// Logout / Identity Refresh
// ============================================================================

#[tokio::test]
async fn test_logout_clears_everything_even_when_server_fails() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    mount_me(&server, "access-1", "alice").await;
    Mock::given(method("POST"))
        .and(path("/auth/revoke-token"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = session_with(&server, Arc::new(store.clone()));
    session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();
    let mut events = session.events();

    session.logout().await.unwrap();

    let state = session.state();
    assert!(store.get().unwrap().is_none());
    assert!(!state.is_authenticated);
    assert!(!state.is_loading);
    assert!(state.user.is_none());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/revoke-token"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Token revoked successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Successfully logged out"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("access-1", "refresh-1"));
    let session = session_with(&server, Arc::new(store.clone()));

    session.logout().await.unwrap();
    assert!(store.get().unwrap().is_none());
}

#[tokio::test]
async fn test_logout_renews_expired_token_before_revoking() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/revoke-token"))
        .and(header("authorization", "Bearer expired-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refresh_token": "valid-refresh"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "fresh-access",
            "valid-refresh",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/revoke-token"))
        .and(header("authorization", "Bearer fresh-access"))
        .and(body_json(json!({"refresh_token": "valid-refresh"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Token revoked successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Successfully logged out"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "valid-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));
    let mut events = session.events();

    session.logout().await.unwrap();

    assert!(store.get().unwrap().is_none());
    assert_eq!(session.refresh_state(), RefreshState::Idle);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_logout_with_dead_refresh_token_emits_only_logged_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/revoke-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("expired-access", "revoked-refresh"));
    let session = session_with(&server, Arc::new(store.clone()));
    let mut events = session.events();

    session.logout().await.unwrap();

    let state = session.state();
    assert!(store.get().unwrap().is_none());
    assert!(!state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(session.refresh_state(), RefreshState::Idle);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_revoke_refresh_token_keeps_local_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/revoke-token"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Token revoked successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("access-1", "refresh-1"));
    let session = session_with(&server, Arc::new(store.clone()));

    let reply = session.revoke_refresh_token().await.unwrap();
    assert_eq!(reply.message, "Token revoked successfully");
    assert!(store.get().unwrap().is_some());

    let logged_out = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let err = logged_out.revoke_refresh_token().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn test_refresh_user_failure_clears_session_but_keeps_store() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body("alice")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = session_with(&server, Arc::new(store.clone()));
    session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();

    let err = session.refresh_user().await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(!session.is_authenticated());
    assert!(store.get().unwrap().is_some());
}

#[tokio::test]
async fn test_update_profile_replaces_user() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    mount_me(&server, "access-1", "alice").await;
    Mock::given(method("PUT"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({"username": "alice2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body("alice2")))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with(&server, Arc::new(MemoryTokenStore::new()));
    session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();

    let updated = session
        .update_profile(ProfileUpdate {
            username: Some("alice2".to_string()),
            email: None,
        })
        .await
        .unwrap();

    assert_eq!(updated.username, "alice2");
    assert_eq!(session.user().unwrap().username, "alice2");
}

#[tokio::test]
async fn test_change_password_and_validate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/change-password"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({
            "current_password": "old-secret",
            "new_password": "new-secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Password changed successfully"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Token is valid",
            "detail": "Authenticated as alice"
        })))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("access-1", "refresh-1"));
    let session = session_with(&server, Arc::new(store));

    let changed = session
        .change_password(PasswordChange {
            current_password: "old-secret".to_string(),
            new_password: "new-secret".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(changed.message, "Password changed successfully");

    let valid = session.validate().await.unwrap();
    assert_eq!(valid.detail.as_deref(), Some("Authenticated as alice"));
}

#[tokio::test]
async fn test_server_error_without_detail_uses_fallback_message() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("Internal Server Error")
                .insert_header("content-type", "text/plain"),
        )
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("access-1", "refresh-1"));
    let session = session_with(&server, Arc::new(store));

    let err = session
        .update_profile(ProfileUpdate {
            email: Some("new@example.com".to_string()),
            username: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(
        err.user_message(),
        scrapelight_core::error::GENERIC_FAILURE_MESSAGE
    );
}

// ============================================================================
// Restart / Initialization
// ============================================================================

#[tokio::test]
async fn test_session_survives_restart_with_file_store() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    mount_me(&server, "access-1", "alice").await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");

    let first = session_with(&server, Arc::new(FileTokenStore::new(&path)));
    first.initialize().await;
    first
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();
    let before = first.state();
    first.dispose();
    drop(first);

    let second = session_with(&server, Arc::new(FileTokenStore::new(&path)));
    assert!(second.is_loading());
    let after = second.initialize().await;

    assert_eq!(after, before);
    assert!(after.is_authenticated);
}

#[tokio::test]
async fn test_initialize_network_failure_keeps_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_pair(pair("access-1", "refresh-1"));
    let session = session_with(&server, Arc::new(store.clone()));

    let state = session.initialize().await;

    assert!(!state.is_authenticated);
    assert!(!state.is_loading);
    assert!(store.get().unwrap().is_some());
}

#[tokio::test]
async fn test_state_changes_are_observable() {
    let server = MockServer::start().await;

    mount_login(&server, "access-1", "refresh-1").await;
    mount_me(&server, "access-1", "alice").await;

    let session = session_with(&server, Arc::new(MemoryTokenStore::new()));
    let mut state = session.subscribe();
    session.initialize().await;

    let watcher = tokio::spawn(async move {
        state
            .wait_for(|s| s.is_authenticated)
            .await
            .map(|s| s.user.clone())
            .unwrap()
    });

    session
        .login(LoginCredentials::new("alice", "secret123"))
        .await
        .unwrap();

    let user = watcher.await.unwrap().unwrap();
    assert_eq!(user.username, "alice");
}
