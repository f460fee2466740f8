//! Error types for the folder layer.

use organizer_segments::SegmentError;
use organizer_transport::ApiError;
use thiserror::Error;

/// Result type alias for folder operations.
pub type Result<T> = std::result::Result<T, FolderError>;

/// Errors that can occur in the folder layer.
#[derive(Error, Debug)]
pub enum FolderError {
    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Segment operation failed.
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// Input rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// No ephemeral chunk with this id.
    #[error("chunk not found: {0}")]
    ChunkNotFound(String),

    /// No local folder with this id.
    #[error("local folder not found: {0}")]
    LocalFolderNotFound(String),

    /// Local store operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FolderError {
    /// The underlying backend error, if any.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            Self::Segment(err) => err.api(),
            _ => None,
        }
    }
}

impl From<FolderError> for SegmentError {
    fn from(err: FolderError) -> Self {
        match err {
            FolderError::Api(e) => Self::Api(e),
            FolderError::Segment(e) => e,
            other => Self::Reference(other.to_string()),
        }
    }
}

/// Local store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create the store directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read the store file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write the store file.
    #[error("failed to write file: {0}")]
    WriteFile(String),
}
