//! `organizer.toml` loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use organizer_transport::TransportConfig;
use serde::Deserialize;
use tracing::debug;

const APP_DIR: &str = "organizer";
const CONFIG_FILE: &str = "organizer.toml";

/// Settings for the command-line tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub transport: TransportConfig,

    /// Where local chunks and folders are kept.
    pub local_store: Option<PathBuf>,

    /// Where the access/refresh token pair is kept.
    pub credentials: Option<PathBuf>,
}

impl CliConfig {
    /// `organizer.toml` in the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load `explicit`, or the default file when it exists, then apply
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::read(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };

        Ok(Self {
            transport: config.transport.with_env_overrides()?,
            ..config
        })
    }

    fn read(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&source)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn local_store_path(&self) -> PathBuf {
        self.local_store
            .clone()
            .unwrap_or_else(|| data_dir().join("local.json"))
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials
            .clone()
            .unwrap_or_else(|| data_dir().join("credentials.json"))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
