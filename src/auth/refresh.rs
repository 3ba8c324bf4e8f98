use std::sync::Arc;

use super::credential::GrantResponse;
use super::error::AuthError;
use crate::config::Config;

/// Exchanges a refresh token for a new grant.
pub struct TokenRefresher {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl TokenRefresher {
    pub fn new(client: reqwest::Client, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Perform the refresh-token grant.
    ///
    /// Any 4xx from the token endpoint means the refresh token is no longer
    /// usable ([`AuthError::RefreshRejected`], terminal); network failures
    /// and 5xx are [`AuthError::Transient`] and leave the stored credential
    /// worth keeping.
    pub async fn refresh(&self, refresh_token: &str) -> Result<GrantResponse, AuthError> {
        let response = self
            .client
            .post(self.config.token_url())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "refresh grant rejected");
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "refresh grant unavailable");
            return Err(AuthError::Transient(format!(
                "token endpoint returned status {status}"
            )));
        }
        let body = response.text().await?;
        let grant: GrantResponse = serde_json::from_str(&body)
            .map_err(|err| AuthError::MalformedResponse(format!("refresh grant: {err}")))?;
        tracing::debug!("refresh grant succeeded");
        Ok(grant)
    }
}
