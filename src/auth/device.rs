use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::credential::GrantResponse;
use super::error::AuthError;
use crate::config::Config;

/// Executes the OAuth2 device-authorization grant.
///
/// One login attempt moves through `REQUESTING_CODE -> POLLING ->
/// {GRANTED, DENIED, TIMED_OUT, CANCELLED}`; terminal states never
/// transition, a fresh call starts an independent [`DeviceAuthSession`].
pub struct DeviceAuthorizer {
    client: reqwest::Client,
    config: Arc<Config>,
}

/// Transient state for one in-flight device login. Never persisted.
#[derive(Debug, Clone)]
pub struct DeviceAuthSession {
    /// Server-issued code used for polling.
    pub device_code: String,
    /// URL the human must visit to approve the login.
    pub verification_uri: String,
    /// Pause between polls, server-specified or the configured default.
    pub interval: std::time::Duration,
    /// Absolute instant after which polling gives up.
    pub deadline: DateTime<Utc>,
}

/// Outcome of a single poll of the token endpoint.
#[derive(Debug)]
enum DevicePoll {
    Pending,
    Granted(Box<GrantResponse>),
    Denied,
}

impl DeviceAuthorizer {
    pub fn new(client: reqwest::Client, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Request a device code and verification URL from the authorization
    /// server.
    pub async fn start(&self) -> Result<DeviceAuthSession, AuthError> {
        let response = self
            .client
            .post(self.config.device_authorization_url())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "device authorization request failed");
            return Err(AuthError::AuthorizationRequestFailed {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        let payload: DeviceAuthorizationResponse = serde_json::from_str(&body)
            .map_err(|err| AuthError::MalformedResponse(format!("device_authorization: {err}")))?;

        let interval = payload
            .interval
            .map(std::time::Duration::from_secs)
            .unwrap_or(self.config.poll_interval);
        let budget = payload
            .expires_in
            .map(Duration::seconds)
            .unwrap_or_else(|| {
                Duration::from_std(self.config.device_login_deadline)
                    .unwrap_or_else(|_| Duration::seconds(600))
            });
        Ok(DeviceAuthSession {
            device_code: payload.device_code,
            verification_uri: payload.verification_uri_complete,
            interval,
            deadline: Utc::now() + budget,
        })
    }

    /// Poll the token endpoint until the user approves, a terminal denial
    /// arrives, the deadline or attempt budget elapses, or `cancel` fires.
    ///
    /// Transient per-poll failures are logged and retried; they count toward
    /// the deadline. Cancellation returns without having touched any state.
    pub async fn poll_until_granted(
        &self,
        session: &DeviceAuthSession,
        cancel: &CancellationToken,
    ) -> Result<GrantResponse, AuthError> {
        for attempt in 1..=self.config.max_poll_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(attempt, "device login cancelled");
                    return Err(AuthError::Cancelled);
                }
                _ = tokio::time::sleep(session.interval) => {}
            }
            if Utc::now() >= session.deadline {
                tracing::warn!(attempt, "device login deadline elapsed");
                return Err(AuthError::Timeout);
            }
            match self.poll_once(session).await {
                Ok(DevicePoll::Granted(grant)) => {
                    tracing::debug!(attempt, "device login granted");
                    return Ok(*grant);
                }
                Ok(DevicePoll::Denied) => {
                    tracing::warn!(attempt, "device login denied by user");
                    return Err(AuthError::Denied);
                }
                Ok(DevicePoll::Pending) => {}
                Err(err) if err.is_transient() => {
                    tracing::warn!(attempt, error = %err, "device poll failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        tracing::warn!(
            attempts = self.config.max_poll_attempts,
            "device login attempt budget exhausted"
        );
        Err(AuthError::Timeout)
    }

    async fn poll_once(&self, session: &DeviceAuthSession) -> Result<DevicePoll, AuthError> {
        let response = self
            .client
            .post(self.config.token_url())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("device_code", session.device_code.as_str()),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let payload: TokenPollResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) if status.is_success() => {
                return Err(AuthError::MalformedResponse(format!("token poll: {err}")));
            }
            Err(err) => {
                // 5xx with an HTML body and similar; retry on the next tick.
                tracing::warn!(status = status.as_u16(), error = %err, "unparseable poll response");
                return Ok(DevicePoll::Pending);
            }
        };

        if payload.grant.access_token.is_some() {
            return Ok(DevicePoll::Granted(Box::new(payload.grant)));
        }
        match payload.error.as_deref() {
            Some("access_denied") => Ok(DevicePoll::Denied),
            Some(error) => {
                tracing::debug!(status = status.as_u16(), error, "authorization not yet granted");
                Ok(DevicePoll::Pending)
            }
            None if !status.is_success() => Ok(DevicePoll::Pending),
            None => Err(AuthError::MalformedResponse(
                "token poll response carries neither grant nor error".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceAuthorizationResponse {
    device_code: String,
    verification_uri_complete: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenPollResponse {
    #[serde(flatten)]
    grant: GrantResponse,
    error: Option<String>,
}
