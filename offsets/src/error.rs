//! Error types for offset validation.

use thiserror::Error;

/// Result type alias for range operations.
pub type Result<T> = std::result::Result<T, RangeError>;

/// Reasons a character range is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// `end` does not lie strictly after `start`.
    #[error("invalid range: end ({end}) must be greater than start ({start})")]
    Empty { start: usize, end: usize },

    /// `end` runs past the end of the text.
    #[error("range end {end} exceeds text length {len}")]
    OutOfBounds { end: usize, len: usize },
}
