use thiserror::Error;

/// Errors produced by the credential lifecycle.
///
/// Terminal variants (`Denied`, `Timeout`, `RefreshRejected`) mean the
/// current credential cannot be recovered without a fresh device login.
/// `Transient` means the same operation may be retried by the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("device authorization denied")]
    Denied,
    #[error("device authorization timed out")]
    Timeout,
    #[error("device authorization cancelled")]
    Cancelled,
    #[error("authorization request failed with status {status}")]
    AuthorizationRequestFailed { status: u16 },
    #[error("refresh token rejected with status {status}")]
    RefreshRejected { status: u16 },
    #[error("transient error: {0}")]
    Transient(String),
    #[error("malformed server response: {0}")]
    MalformedResponse(String),
    #[error("credential persistence failed: {0}")]
    Persistence(String),
}

impl AuthError {
    /// Whether the caller may retry the same operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether recovery requires a new interactive device login.
    pub fn needs_device_login(&self) -> bool {
        matches!(
            self,
            Self::Denied | Self::Timeout | Self::RefreshRejected { .. }
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transient(error.without_url().to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Persistence(error.to_string())
    }
}
