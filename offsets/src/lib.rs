//! # Offsets
//!
//! Character-offset model for segmented documents.
//!
//! Every segment is anchored to a half-open range of *characters* (Unicode
//! scalar values) in its document's text. This crate owns the arithmetic:
//!
//! - **Ranges**: validated [`CharRange`]s and slicing by character offset
//! - **Splitting**: [`split_by_range`] partitions text around a range without
//!   ever panicking
//! - **Selections**: [`translate_selection`] maps a selection reported against
//!   a rendered view back onto offsets in the source text
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Offset Model                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RenderNode tree ──► Selection ──► TextSelection                │
//! │                                         │                       │
//! │                                         ▼                       │
//! │                     CharRange ──► split_by_range / slice_chars  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod range;
pub mod selection;

pub use error::{RangeError, Result};
pub use range::{CharRange, Split, char_len, slice_chars, split_by_range};
pub use selection::{
    BoundaryPoint, ElementKind, NodeId, RenderNode, Selection, TextSelection, translate_selection,
};
