//! Client configuration: endpoints, client credentials, poll cadence.

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::auth::store::default_credential_path;

const DEFAULT_AUTH_BASE: &str = "https://auth.tidal.com/v1/oauth2";
const DEFAULT_API_BASE: &str = "https://api.tidal.com/v1";
const DEFAULT_SCOPE: &str = "r_usr+w_usr+w_sub";

// Client credentials ship lightly obfuscated, matching how every public
// Tidal client distributes them.
const OBFUSCATED_CLIENT_ID: &str = "ZlgySnhkbW50WldLMGl4VA==";
const OBFUSCATED_CLIENT_SECRET: &str = "MU5tNUFmREFqeHJnSkZKYktOV0xlQXlLR1ZHbUlOdVhQUExIVlhBdnhBZz0=";

/// Configuration for the authentication core.
///
/// `Default` targets the production endpoints; tests point `auth_base` and
/// `api_base` at a mock server via the `with_*` builders.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OAuth2 authorization server.
    pub auth_base: String,
    /// Base URL of the streaming API (used for the session probe).
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    /// Where the credential record is persisted.
    pub credential_path: PathBuf,
    /// Pause between device-code polls when the server does not specify one.
    pub poll_interval: Duration,
    /// Upper bound on device-code polls before giving up.
    pub max_poll_attempts: u32,
    /// Wall-clock budget for the whole device login when the server does not
    /// send its own expiry.
    pub device_login_deadline: Duration,
    /// Bound on each individual HTTP call, independent of the login deadline.
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client_id: deobfuscate(OBFUSCATED_CLIENT_ID),
            client_secret: deobfuscate(OBFUSCATED_CLIENT_SECRET),
            scope: DEFAULT_SCOPE.to_string(),
            credential_path: default_credential_path(),
            poll_interval: Duration::from_secs(4),
            max_poll_attempts: 150,
            device_login_deadline: Duration::from_secs(600),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config with `RIPTIDE_*` environment overrides applied.
    ///
    /// Loads a `.env` file first if one is present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(value) = std::env::var("RIPTIDE_AUTH_BASE") {
            config.auth_base = value;
        }
        if let Ok(value) = std::env::var("RIPTIDE_API_BASE") {
            config.api_base = value;
        }
        if let Ok(value) = std::env::var("RIPTIDE_CLIENT_ID") {
            config.client_id = value;
        }
        if let Ok(value) = std::env::var("RIPTIDE_CLIENT_SECRET") {
            config.client_secret = value;
        }
        if let Ok(value) = std::env::var("RIPTIDE_CREDENTIAL_PATH") {
            config.credential_path = PathBuf::from(value);
        }
        config
    }

    pub fn with_auth_base(mut self, url: impl Into<String>) -> Self {
        self.auth_base = url.into();
        self
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_credential_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_path = path.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn device_authorization_url(&self) -> String {
        format!("{}/device_authorization", self.auth_base)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.auth_base)
    }

    pub fn sessions_url(&self) -> String {
        format!("{}/sessions", self.api_base)
    }
}

fn deobfuscate(value: &str) -> String {
    BASE64
        .decode(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}
