use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::credential::Credential;
use super::error::AuthError;

const CREDENTIAL_FILE_VERSION: u32 = 1;

/// Durable persistence for the single credential record.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted credential.
    ///
    /// A missing, unreadable, or corrupt file is a normal first-run state,
    /// not an error: it yields `Credential::default()` and a log line.
    fn load(&self) -> Credential;

    /// Durably persist the full record.
    ///
    /// A crash mid-save must leave either the old complete file or the new
    /// complete file, never a truncated one.
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;

    /// Remove the persisted credential (logout).
    fn clear(&self) -> Result<(), AuthError>;
}

/// File-backed credential store writing a single JSON document.
///
/// # Example
/// ```no_run
/// use riptide::auth::{Credential, CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new_default();
/// store.save(&Credential::default())?;
/// # Ok::<(), riptide::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> Self {
        Self {
            path: default_credential_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Credential {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no credential file yet");
                return Credential::default();
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "credential file unreadable, treating as not logged in"
                );
                return Credential::default();
            }
        };
        match serde_json::from_str::<CredentialFile>(&raw) {
            Ok(file) if file.version == CREDENTIAL_FILE_VERSION => file.credential,
            Ok(file) => {
                tracing::warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "unsupported credential file version, treating as not logged in"
                );
                Credential::default()
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "credential file corrupt, treating as not logged in"
                );
                Credential::default()
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let file = CredentialFile {
            version: CREDENTIAL_FILE_VERSION,
            credential: credential.clone(),
        };
        let serialized =
            serde_json::to_vec_pretty(&file).map_err(|err| AuthError::Persistence(err.to_string()))?;
        atomic_write(&self.path, &serialized)?;
        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Persistence(err.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    #[serde(flatten)]
    credential: Credential,
}

/// Default credential location (~/.riptide/credential.json).
pub fn default_credential_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".riptide"))
        .unwrap_or_else(|| PathBuf::from(".riptide"))
        .join("credential.json")
}

/// Write `data` to `path` such that readers only ever observe a complete
/// file: write to a uniquely named temp file in the same directory, fsync,
/// then rename over the target.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| AuthError::Persistence(format!("{} has no file name", path.display())))?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::Persistence(err.to_string()));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::Persistence(err.to_string()));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
