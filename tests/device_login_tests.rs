mod auth_support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use riptide::auth::{AuthError, Credential, SessionStatus};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{grant_body, manager, InMemoryCredentialStore};

fn device_authorization_body() -> serde_json::Value {
    json!({
        "deviceCode": "device-code-1",
        "verificationUriComplete": "https://link.tidal.com/ABCDE",
        "expiresIn": 300,
        "interval": 0
    })
}

async fn mount_device_authorization(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/device_authorization"))
        .and(body_string_contains("client_id="))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_authorization_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn device_login_presents_url_and_persists_grant() {
    let server = MockServer::start().await;
    mount_device_authorization(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(body_string_contains("device_code=device-code-1"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(grant_body("granted-access", "granted-refresh")),
        )
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = manager(&server, store.clone());

    let mut presented = None;
    session
        .device_login(CancellationToken::new(), |url| {
            presented = Some(url.to_string());
        })
        .await
        .unwrap();

    assert_eq!(presented.as_deref(), Some("https://link.tidal.com/ABCDE"));
    let persisted = store.get();
    assert_eq!(persisted.access_token, "granted-access");
    assert_eq!(persisted.refresh_token, "granted-refresh");
    assert_eq!(persisted.user_id, "12345");
    assert_eq!(persisted.country_code, "US");
    assert_eq!(
        session.ensure_authenticated().await.unwrap(),
        SessionStatus::Authenticated
    );
}

#[tokio::test]
async fn device_login_keeps_polling_through_pending_responses() {
    let server = MockServer::start().await;
    mount_device_authorization(&server).await;
    // Two pending responses, then the grant.
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(grant_body("granted-access", "granted-refresh")),
        )
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = manager(&server, store.clone());

    session
        .device_login(CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(store.get().access_token, "granted-access");
}

#[tokio::test]
async fn device_login_denied_by_user_is_terminal() {
    let server = MockServer::start().await;
    mount_device_authorization(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "access_denied"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = manager(&server, store.clone());

    let err = session
        .device_login(CancellationToken::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Denied));
    assert!(err.needs_device_login());
    assert_eq!(store.get(), Credential::default());
}

#[tokio::test]
async fn device_login_times_out_after_attempt_budget() {
    // The server keeps answering expired_token; the loop keeps polling
    // until the attempt budget (3 in tests) runs out.
    let server = MockServer::start().await;
    mount_device_authorization(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "expired_token"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = manager(&server, store.clone());

    let err = session
        .device_login(CancellationToken::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout));
    assert_eq!(store.get(), Credential::default());
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn device_login_survives_transient_poll_failures() {
    let server = MockServer::start().await;
    mount_device_authorization(&server).await;
    // A 502 with an HTML body must not end the attempt.
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(grant_body("granted-access", "granted-refresh")),
        )
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = manager(&server, store.clone());

    session
        .device_login(CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(store.get().access_token, "granted-access");
}

#[tokio::test]
async fn device_login_fails_fast_when_authorization_request_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/device_authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = manager(&server, store.clone());

    let mut presented = false;
    let err = session
        .device_login(CancellationToken::new(), |_| presented = true)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::AuthorizationRequestFailed { status: 500 }
    ));
    assert!(!presented);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_device_login_leaves_credential_untouched() {
    let server = MockServer::start().await;
    // Slow server-specified interval, so the poll loop is parked in its
    // first sleep when the cancel arrives.
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/device_authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceCode": "device-code-1",
            "verificationUriComplete": "https://link.tidal.com/ABCDE",
            "expiresIn": 300,
            "interval": 5
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = Arc::new(manager(&server, store.clone()));

    let cancel = CancellationToken::new();
    let login = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.device_login(cancel, |_| {}).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    cancel.cancel();

    let err = login.await.unwrap().unwrap_err();
    assert!(matches!(err, AuthError::Cancelled));
    assert_eq!(store.get(), Credential::default());

    // The flight guard was released: a follow-up ensure_authenticated runs.
    assert_eq!(
        session.ensure_authenticated().await.unwrap(),
        SessionStatus::NeedsDeviceLogin
    );
}
