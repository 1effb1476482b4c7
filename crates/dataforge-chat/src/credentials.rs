//! Access token storage
//!
//! Stores the bearer token in ~/.config/dataforge/credentials.json with
//! restricted permissions (0o600). `DATAFORGE_TOKEN` takes precedence.

use dataforge_stream::CredentialStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Environment variable that overrides the stored token
pub const TOKEN_ENV_VAR: &str = "DATAFORGE_TOKEN";

/// Persisted credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    /// When the token was saved, in milliseconds since the epoch
    pub saved_at: i64,
}

impl StoredCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            saved_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Token store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    use_env: bool,
}

impl FileCredentialStore {
    /// Store at the default location, honouring `DATAFORGE_TOKEN`
    pub fn new() -> Self {
        Self {
            path: default_path(),
            use_env: true,
        }
    }

    /// Store at an explicit path, ignoring the environment
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_env: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored credentials, if any
    pub fn load(&self) -> Option<StoredCredentials> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!("Ignoring unreadable credentials file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Persist a token, replacing any previous one
    pub fn save(&self, access_token: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
                // Set directory permissions to 0o700 on Unix
                #[cfg(unix)]
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }

        let content = serde_json::to_string_pretty(&StoredCredentials::new(access_token))?;
        fs::write(&self.path, content)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Delete the stored token. Missing file is not an error.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for FileCredentialStore {
    fn bearer_token(&self) -> Option<String> {
        if self.use_env {
            if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
                if !token.is_empty() {
                    return Some(token);
                }
            }
        }
        self.load()
            .map(|c| c.access_token)
            .filter(|t| !t.is_empty())
    }
}

fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dataforge")
        .join("credentials.json")
}
