//! Device-flow authentication and credential lifecycle.

pub mod credential;
pub mod device;
pub mod error;
pub mod refresh;
pub mod session;
pub mod store;

pub use credential::{Credential, GrantResponse, SAFETY_MARGIN_SECS};
pub use device::{DeviceAuthSession, DeviceAuthorizer};
pub use error::AuthError;
pub use refresh::TokenRefresher;
pub use session::{SessionManager, SessionStatus};
pub use store::{CredentialStore, FileCredentialStore};
