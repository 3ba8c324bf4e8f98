use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::credential::Credential;
use super::device::DeviceAuthorizer;
use super::error::AuthError;
use super::refresh::TokenRefresher;
use super::store::CredentialStore;
use crate::config::Config;

/// What a caller holds after `ensure_authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The cached access token is usable right now.
    Authenticated,
    /// No usable token and no usable refresh token; the caller must run the
    /// interactive [`SessionManager::device_login`] flow.
    NeedsDeviceLogin,
}

/// Owns the process-wide credential and the shared HTTP client, and decides
/// between no-op, refresh, and device login.
///
/// Reads of a valid credential take only a read lock. Refresh and device
/// login serialize on a single flight guard, so concurrent callers observe
/// one network round-trip instead of N.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use riptide::auth::{FileCredentialStore, SessionManager, SessionStatus};
/// use riptide::config::Config;
///
/// # async fn example() -> Result<(), riptide::auth::AuthError> {
/// let config = Config::from_env();
/// let store = Arc::new(FileCredentialStore::new(config.credential_path.clone()));
/// let session = SessionManager::new(config, store)?;
/// match session.ensure_authenticated().await? {
///     SessionStatus::Authenticated => { /* proceed with API calls */ }
///     SessionStatus::NeedsDeviceLogin => { /* prompt the user to /login */ }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    client: reqwest::Client,
    config: Arc<Config>,
    store: Arc<dyn CredentialStore>,
    credential: RwLock<Credential>,
    /// Serializes refresh and device login. Held only while network I/O for
    /// a credential change is in flight, never across plain reads.
    flight: Mutex<()>,
}

impl SessionManager {
    /// Build a manager, loading any previously persisted credential.
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| AuthError::Transient(format!("http client: {err}")))?;
        let credential = store.load();
        if credential.is_valid(Utc::now()) {
            tracing::debug!(user_id = %credential.user_id, "loaded valid credential");
        }
        Ok(Self {
            client,
            config: Arc::new(config),
            store,
            credential: RwLock::new(credential),
            flight: Mutex::new(()),
        })
    }

    /// Make sure a usable access token is available, refreshing if possible.
    ///
    /// Returns [`SessionStatus::NeedsDeviceLogin`] when only an interactive
    /// login can help; transient failures propagate unchanged so the caller
    /// keeps its retry policy (and its stored credential).
    pub async fn ensure_authenticated(&self) -> Result<SessionStatus, AuthError> {
        if self.credential.read().await.is_valid(Utc::now()) {
            return Ok(SessionStatus::Authenticated);
        }

        let _flight = self.flight.lock().await;
        // Re-check under the guard: a concurrent caller may have already
        // refreshed while this one was waiting.
        let snapshot = self.credential.read().await.clone();
        if snapshot.is_valid(Utc::now()) {
            return Ok(SessionStatus::Authenticated);
        }
        if !snapshot.can_refresh() {
            return Ok(SessionStatus::NeedsDeviceLogin);
        }

        let refresher = TokenRefresher::new(self.client.clone(), self.config.clone());
        match refresher.refresh(&snapshot.refresh_token).await {
            Ok(grant) => {
                let mut updated = snapshot;
                updated.apply_grant(&grant, Utc::now())?;
                self.commit(updated).await?;
                Ok(SessionStatus::Authenticated)
            }
            Err(AuthError::RefreshRejected { status }) => {
                tracing::warn!(status, "refresh token no longer usable, clearing it");
                let mut cleared = snapshot;
                cleared.clear_refresh_token();
                self.commit(cleared).await?;
                Ok(SessionStatus::NeedsDeviceLogin)
            }
            Err(err) => Err(err),
        }
    }

    /// Run the interactive device-authorization flow.
    ///
    /// `present` receives the verification URL exactly once; showing it to a
    /// human (log line, chat message) is the caller's concern. Cancellation
    /// via `cancel` aborts the poll loop and leaves the stored credential
    /// untouched.
    pub async fn device_login<F>(
        &self,
        cancel: CancellationToken,
        present: F,
    ) -> Result<(), AuthError>
    where
        F: FnOnce(&str),
    {
        let _flight = self.flight.lock().await;
        let authorizer = DeviceAuthorizer::new(self.client.clone(), self.config.clone());
        let session = authorizer.start().await?;
        present(&session.verification_uri);
        let grant = authorizer.poll_until_granted(&session, &cancel).await?;

        let mut credential = Credential::default();
        credential.apply_grant(&grant, Utc::now())?;
        tracing::info!(user_id = %credential.user_id, "device login granted");
        self.commit(credential).await
    }

    /// Probe the API with the cached access token.
    ///
    /// `Ok(false)` means the server no longer accepts the token; transient
    /// failures do not condemn the stored credential.
    pub async fn verify_session(&self) -> Result<bool, AuthError> {
        let access_token = self.credential.read().await.access_token.clone();
        if access_token.is_empty() {
            return Ok(false);
        }
        let response = self
            .client
            .get(self.config.sessions_url())
            .bearer_auth(&access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.is_server_error() {
            return Err(AuthError::Transient(format!(
                "session probe returned status {status}"
            )));
        }
        tracing::warn!(status = status.as_u16(), "session probe rejected access token");
        Ok(false)
    }

    /// Forget the credential in memory and on disk.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _flight = self.flight.lock().await;
        *self.credential.write().await = Credential::default();
        self.store.clear()
    }

    pub async fn access_token(&self) -> String {
        self.credential.read().await.access_token.clone()
    }

    pub async fn user_id(&self) -> String {
        self.credential.read().await.user_id.clone()
    }

    pub async fn country_code(&self) -> String {
        self.credential.read().await.country_code.clone()
    }

    /// The shared HTTP client; collaborators reuse it for API calls.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Publish a credential change: memory first, then disk. If persistence
    /// fails the in-memory credential stays usable for this process and the
    /// error is surfaced rather than swallowed.
    async fn commit(&self, credential: Credential) -> Result<(), AuthError> {
        *self.credential.write().await = credential.clone();
        self.store.save(&credential)
    }
}
