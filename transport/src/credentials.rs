//! Credential storage.
//!
//! The transport reads the current pair before each call and replaces it after
//! a successful refresh. Issuing credentials (login) is someone else's job;
//! the store only holds what it is given.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ApiError, Result};

/// An access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Where credentials live between calls.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credentials, if signed in.
    async fn load(&self) -> Result<Option<Credentials>>;

    /// Replace the stored credentials.
    async fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Forget the stored credentials.
    async fn clear(&self) -> Result<()>;
}

/// Process-local credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Some(credentials)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.current.read().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.current.write().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.current.write().await = None;
        Ok(())
    }
}

/// Credentials persisted as a JSON file.
///
/// Reads go through an in-memory copy; writes replace the file atomically via
/// a temp file.
pub struct FileCredentialStore {
    path: PathBuf,
    current: RwLock<Option<Credentials>>,
}

impl FileCredentialStore {
    /// Open the store at `path`. A missing file means signed out.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let current = match fs::read_to_string(&path).await {
            Ok(content) => Some(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ApiError::Storage(format!("{}: {e}", path.display())));
            }
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_file(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Storage(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(credentials)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| ApiError::Storage(format!("{}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ApiError::Storage(format!("{}: {e}", self.path.display())))?;

        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.current.read().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut current = self.current.write().await;
        self.write_file(credentials).await?;
        *current = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut current = self.current.write().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ApiError::Storage(format!("{}: {e}", self.path.display())));
            }
        }
        *current = None;
        Ok(())
    }
}
