//! Error types for the transport layer.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by backend calls.
///
/// The enum is `Clone` so a single failed call can be handed to every caller
/// that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received.
    #[error("network error: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Credentials are missing or could not be renewed.
    #[error("authentication expired, please sign in again")]
    AuthExpired,

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential storage failed.
    #[error("credential storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// HTTP status of a server error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend reported that the resource already exists.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Whether the backend reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
