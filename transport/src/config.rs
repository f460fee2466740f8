//! Configuration for the transport layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Environment variable overriding [`TransportConfig::base_url`].
pub const BASE_URL_ENV: &str = "ORGANIZER_BASE_URL";

/// Environment variable overriding [`TransportConfig::cache_ttl_secs`].
pub const CACHE_TTL_ENV: &str = "ORGANIZER_CACHE_TTL_SECS";

/// Configuration for backend access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Root of the backend API, without a trailing slash.
    pub base_url: String,

    /// How long cached reads stay fresh.
    pub cache_ttl_secs: u64,

    /// Maximum number of cached responses.
    pub cache_max_entries: usize,

    /// Path of the credential refresh endpoint.
    pub refresh_path: String,

    /// Paths whose 401 responses never trigger a refresh.
    pub auth_exempt_paths: Vec<String>,
}

impl TransportConfig {
    /// Create a configuration for the given API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the maximum number of cached responses.
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache_max_entries = max_entries;
        self
    }

    /// Set the refresh endpoint path.
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Add a path that must never trigger a refresh-and-retry.
    pub fn with_exempt_path(mut self, path: impl Into<String>) -> Self {
        self.auth_exempt_paths.push(path.into());
        self
    }

    /// Parse a configuration from TOML. Missing keys take default values.
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ApiError::Config(e.to_string()))
    }

    /// Apply `ORGANIZER_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            self.base_url = url;
        }
        if let Ok(ttl) = std::env::var(CACHE_TTL_ENV) {
            self.cache_ttl_secs = ttl
                .parse()
                .map_err(|_| ApiError::Config(format!("{CACHE_TTL_ENV} must be seconds, got {ttl:?}")))?;
        }
        Ok(self)
    }

    /// The cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Whether a 401 on `path` must be surfaced without refreshing.
    pub fn is_auth_exempt(&self, path: &str) -> bool {
        path == self.refresh_path || self.auth_exempt_paths.iter().any(|p| p == path)
    }

    /// Absolute URL for a request target (`/path?query`).
    pub fn endpoint(&self, target: &str) -> String {
        format!("{}{target}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            cache_ttl_secs: 600,
            cache_max_entries: 512,
            refresh_path: "/auth/refresh".to_string(),
            auth_exempt_paths: vec![
                "/auth/login".to_string(),
                "/auth/register".to_string(),
                "/auth/refresh".to_string(),
            ],
        }
    }
}
