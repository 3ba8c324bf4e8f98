//! Riptide — Tidal API client core.
//!
//! Drives the OAuth2 device-authorization grant against the Tidal auth
//! server, persists the resulting credential atomically, and keeps it valid
//! across restarts by transparently refreshing expired access tokens. Front
//! ends (a bot, a CLI) stay thin: they call
//! [`SessionManager::ensure_authenticated`](auth::SessionManager::ensure_authenticated)
//! before every API operation and run
//! [`device_login`](auth::SessionManager::device_login) only when told to.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use riptide::auth::{FileCredentialStore, SessionManager, SessionStatus};
//! use riptide::config::Config;
//!
//! # async fn example() -> Result<(), riptide::auth::AuthError> {
//! let config = Config::from_env();
//! let store = Arc::new(FileCredentialStore::new(config.credential_path.clone()));
//! let session = SessionManager::new(config, store)?;
//!
//! if session.ensure_authenticated().await? == SessionStatus::NeedsDeviceLogin {
//!     let cancel = tokio_util::sync::CancellationToken::new();
//!     session
//!         .device_login(cancel, |url| println!("Please visit: {url}"))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
