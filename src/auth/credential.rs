use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Tokens are treated as expired this many seconds before their actual
/// expiry, to tolerate clock skew and in-flight request latency.
pub const SAFETY_MARGIN_SECS: i64 = 3600;

/// The persisted credential record for a single account.
///
/// The zero value (`Credential::default()`) means "never authenticated" and
/// is what [`super::CredentialStore::load`] returns on a missing or corrupt
/// file.
///
/// # Example
/// ```
/// use riptide::auth::Credential;
/// use chrono::Utc;
///
/// let credential = Credential::default();
/// assert!(!credential.is_valid(Utc::now()));
/// assert!(!credential.can_refresh());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API calls; empty means never authenticated.
    #[serde(default)]
    pub access_token: String,
    /// Long-lived token used to mint new access tokens; empty means refresh
    /// is impossible.
    #[serde(default)]
    pub refresh_token: String,
    /// Opaque account identifier returned by the server.
    #[serde(default)]
    pub user_id: String,
    /// Two-letter region code required by API calls.
    #[serde(default)]
    pub country_code: String,
    /// Absolute expiry instant of `access_token`, unix seconds.
    #[serde(default)]
    pub expires_at: i64,
}

impl Credential {
    /// Whether `access_token` can still be used at `now`.
    ///
    /// An empty access token is never valid, regardless of `expires_at`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now.timestamp() < self.expires_at - SAFETY_MARGIN_SECS
    }

    /// Whether a refresh grant can be attempted.
    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Overwrite all fields from a successful grant or refresh response.
    ///
    /// Fails with [`AuthError::MalformedResponse`] if any required field is
    /// absent; on failure `self` is left unchanged.
    pub fn apply_grant(&mut self, grant: &GrantResponse, now: DateTime<Utc>) -> Result<(), AuthError> {
        let access_token = grant.access_token.clone().ok_or_else(|| missing("access_token"))?;
        let refresh_token = grant.refresh_token.clone().ok_or_else(|| missing("refresh_token"))?;
        let expires_in = grant.expires_in.ok_or_else(|| missing("expires_in"))?;
        let user = grant.user.as_ref().ok_or_else(|| missing("user"))?;
        let user_id = user.user_id()?;
        let country_code = user.country_code.clone().ok_or_else(|| missing("user.countryCode"))?;

        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.expires_at = now.timestamp() + expires_in;
        self.user_id = user_id;
        self.country_code = country_code;
        Ok(())
    }

    /// Drop the refresh token after a terminal refresh rejection.
    pub fn clear_refresh_token(&mut self) {
        self.refresh_token.clear();
    }
}

/// Body of a successful device or refresh grant.
///
/// All fields are optional at the wire level; [`Credential::apply_grant`]
/// enforces presence so that a partial response never half-updates state.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: Option<GrantUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantUser {
    /// The server sends this as a JSON number; accept a string too.
    #[serde(rename = "userId")]
    pub user_id: Option<serde_json::Value>,
    #[serde(rename = "countryCode")]
    pub country_code: Option<String>,
}

impl GrantUser {
    fn user_id(&self) -> Result<String, AuthError> {
        match &self.user_id {
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(other) => Err(AuthError::MalformedResponse(format!(
                "user.userId has unexpected type: {}",
                json_type_name(other)
            ))),
            None => Err(missing("user.userId")),
        }
    }
}

fn missing(field: &str) -> AuthError {
    AuthError::MalformedResponse(format!("grant response missing {field}"))
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
