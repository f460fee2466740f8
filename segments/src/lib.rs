//! # Segments
//!
//! Durable, offset-anchored segments of source documents.
//!
//! A segment is produced either by automatic segmentation (per
//! [`SegmentMode`]) or drawn by hand from a selection. Manual ranges are
//! validated locally before anything is sent, and manual segments survive
//! re-segmentation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TextSelection ──► SegmentStore ──► Transport ──► backend       │
//! │                        │                                        │
//! │                 ReferenceGuard (folders)                        │
//! │                                                                 │
//! │  DocumentStore ──► replace_text ──► audit_offsets (report only) │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod anchors;
pub mod documents;
pub mod error;
pub mod model;
pub mod store;

pub use anchors::{OffsetIssue, audit_offsets};
pub use documents::DocumentStore;
pub use error::{Result, SegmentError};
pub use model::{
    DeletedSegment, DeletedSegments, Document, DocumentId, ManualSegment, ParseStatus, Segment, SegmentId,
    SegmentListing, SegmentMeta, SegmentMode, SegmentPatch, SegmentationRun, SegmentationSummary,
};
pub use store::{NoReferences, ReferenceGuard, SegmentStore};
