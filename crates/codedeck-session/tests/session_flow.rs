//! Session lifecycle tests against a mock identity provider.

use codedeck_core::Navigator;
use codedeck_identity::{CallbackOutcome, IdentityClient};
use codedeck_session::{SessionManager, SessionStatus};
use codedeck_storage::{MemoryStorage, TokenRecord, TokenStore};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Navigator that records targets instead of driving a browser.
#[derive(Default)]
struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.targets.lock().unwrap().push(target.to_string());
    }
}

struct Harness {
    manager: SessionManager,
    store: Arc<TokenStore>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(server: &MockServer) -> Harness {
    let store = Arc::new(TokenStore::new(Box::new(MemoryStorage::new())));
    let identity = IdentityClient::new(
        server.uri(),
        "http://localhost:9847/auth/callback",
        "http://localhost:9847",
        store.clone(),
    );
    let navigator = Arc::new(RecordingNavigator::default());
    Harness {
        manager: SessionManager::new(identity, navigator.clone()),
        store,
        navigator,
    }
}

fn valid_record() -> TokenRecord {
    TokenRecord {
        access_token: "tok1".to_string(),
        refresh_token: Some("ref1".to_string()),
        expires_at_ms: Some(chrono::Utc::now().timestamp_millis() + 3_600_000),
    }
}

fn expired_record() -> TokenRecord {
    TokenRecord {
        access_token: "tok-old".to_string(),
        refresh_token: Some("ref1".to_string()),
        expires_at_ms: Some(chrono::Utc::now().timestamp_millis() - 1000),
    }
}

#[tokio::test]
async fn boot_with_empty_store_makes_no_network_calls() {
    let server = MockServer::start().await;
    let h = harness(&server);

    // No request of any kind may reach the provider.
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let status = h.manager.initialize().await;
    assert_eq!(status, SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn boot_with_valid_token_skips_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server);
    h.store.save(&valid_record()).unwrap();

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "email": "a@b.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = h.manager.initialize().await;
    assert_eq!(status, SessionStatus::Authenticated);
    assert_eq!(h.manager.current_user().unwrap().id, "u1");
}

#[tokio::test]
async fn boot_with_expired_token_refreshes_then_authenticates() {
    let server = MockServer::start().await;
    let h = harness(&server);
    h.store.save(&expired_record()).unwrap();

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok2",
            "refresh_token": "ref2",
            "expires_at": chrono::Utc::now().timestamp() + 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer tok2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "email": "a@b.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = h.manager.initialize().await;
    assert_eq!(status, SessionStatus::Authenticated);
    assert_eq!(h.store.load().unwrap().unwrap().access_token, "tok2");
}

#[tokio::test]
async fn boot_with_failed_refresh_ends_unauthenticated() {
    let server = MockServer::start().await;
    let h = harness(&server);
    h.store.save(&expired_record()).unwrap();

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let status = h.manager.initialize().await;
    assert_eq!(status, SessionStatus::Unauthenticated);

    // Stale tokens are not cleared by a failed refresh.
    assert!(h.store.load().unwrap().is_some());
}

#[tokio::test]
async fn callback_code_exchange_authenticates() {
    let server = MockServer::start().await;
    let h = harness(&server);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok1",
            "refresh_token": "ref1",
            "expires_at": chrono::Utc::now().timestamp() + 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "email": "a@b.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The login URL issued the state this callback returns.
    let login_url = h.manager.identity().login_url("/snippets").unwrap();
    let state = login_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let resolution = h
        .manager
        .handle_callback(CallbackOutcome::Code {
            code: "abc123".to_string(),
            state: Some(state),
        })
        .await;

    assert_eq!(resolution.status, SessionStatus::Authenticated);
    assert_eq!(resolution.destination, Some("/snippets".to_string()));

    let user = h.manager.current_user().unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.email, "a@b.com");
    assert_eq!(h.store.load().unwrap().unwrap().access_token, "tok1");
}

#[tokio::test]
async fn callback_error_never_reaches_token_endpoint() {
    let server = MockServer::start().await;
    let h = harness(&server);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let resolution = h
        .manager
        .handle_callback(CallbackOutcome::Denied {
            error: "access_denied".to_string(),
            description: None,
        })
        .await;

    assert_eq!(resolution.status, SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn callback_exchange_rejection_reaches_failed() {
    let server = MockServer::start().await;
    let h = harness(&server);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let resolution = h
        .manager
        .handle_callback(CallbackOutcome::Code {
            code: "bad".to_string(),
            state: None,
        })
        .await;

    assert_eq!(resolution.status, SessionStatus::Failed);
    assert!(h.manager.last_error().is_some());
}

#[tokio::test]
async fn logout_clears_store_and_redirects_to_provider() {
    let server = MockServer::start().await;
    let h = harness(&server);
    h.store.save(&valid_record()).unwrap();

    h.manager.logout().unwrap();

    assert_eq!(h.manager.status(), SessionStatus::Unauthenticated);
    assert_eq!(h.store.load().unwrap(), None);

    let targets = h.navigator.targets();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].starts_with(&format!("{}/logout?", server.uri())));
    assert!(targets[0].contains("redirect_uri="));
}

#[tokio::test]
async fn fresh_access_token_refreshes_expired_token() {
    let server = MockServer::start().await;
    let h = harness(&server);
    h.store.save(&expired_record()).unwrap();

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok2",
            "refresh_token": "ref2",
            "expires_at": chrono::Utc::now().timestamp() + 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(
        h.manager.fresh_access_token().await,
        Some("tok2".to_string())
    );

    // Token is now fresh; no second refresh happens.
    assert_eq!(
        h.manager.fresh_access_token().await,
        Some("tok2".to_string())
    );
}
