#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use riptide::auth::{AuthError, Credential, CredentialStore, SessionManager};
use riptide::config::Config;
use serde_json::json;
use wiremock::MockServer;

/// In-memory store that counts writes and can be told to fail them.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credential: Mutex<Credential>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(credential: Credential) -> Self {
        let store = Self::default();
        *store.credential.lock().expect("store lock poisoned") = credential;
        store
    }

    pub fn get(&self) -> Credential {
        self.credential.lock().expect("store lock poisoned").clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_next_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Credential {
        self.get()
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AuthError::Persistence("store unavailable".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.credential.lock().expect("store lock poisoned") = credential.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.credential.lock().expect("store lock poisoned") = Credential::default();
        Ok(())
    }
}

/// A credential whose access token is valid for another day.
pub fn valid_credential() -> Credential {
    Credential {
        access_token: "valid-access".to_string(),
        refresh_token: "valid-refresh".to_string(),
        user_id: "12345".to_string(),
        country_code: "US".to_string(),
        expires_at: Utc::now().timestamp() + 86_400,
    }
}

/// A credential that expired ten seconds ago but can still refresh.
pub fn expired_credential() -> Credential {
    Credential {
        access_token: "stale-access".to_string(),
        refresh_token: "stale-refresh".to_string(),
        user_id: "12345".to_string(),
        country_code: "US".to_string(),
        expires_at: Utc::now().timestamp() - 10,
    }
}

/// Grant body in the shape the token endpoint returns.
pub fn grant_body(access_token: &str, refresh_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_in": 86_400,
        "user": { "userId": 12345, "countryCode": "US" }
    })
}

/// Config pointed at a mock server, with fast polling for tests.
pub fn test_config(server: &MockServer) -> Config {
    Config::default()
        .with_auth_base(format!("{}/v1/oauth2", server.uri()))
        .with_api_base(format!("{}/v1", server.uri()))
        .with_poll_interval(std::time::Duration::ZERO)
        .with_max_poll_attempts(3)
}

pub fn manager(server: &MockServer, store: Arc<InMemoryCredentialStore>) -> SessionManager {
    SessionManager::new(test_config(server), store).expect("build session manager")
}
