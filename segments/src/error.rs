//! Error types for segment operations.

use organizer_offsets::RangeError;
use organizer_transport::ApiError;
use thiserror::Error;

use crate::model::{ParseStatus, SegmentId};

/// Result type alias for segment operations.
pub type Result<T> = std::result::Result<T, SegmentError>;

/// Errors that can occur in the segment store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Offsets rejected before any network call.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Input rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// The document has not finished parsing.
    #[error("document is not ready for segmentation (parse status: {status})")]
    NotParsed { status: ParseStatus },

    /// Duplicates of the segment are still filed in folders.
    #[error("segment {segment_id} still has {duplicates} filed duplicate(s); unfile them first")]
    StillReferenced {
        segment_id: SegmentId,
        duplicates: usize,
    },

    /// The reference check could not be completed.
    #[error("reference check failed: {0}")]
    Reference(String),
}

impl SegmentError {
    /// The underlying backend error, if any.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}
