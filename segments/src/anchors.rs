//! Offset audit after text replacement.
//!
//! Segments are never re-anchored or clamped. The audit only reports which
//! ones no longer line up with the current text.

use std::fmt;

use organizer_offsets::{char_len, slice_chars};
use serde::Serialize;

use crate::model::{Document, Segment, SegmentId};

/// A segment whose stored range no longer agrees with the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OffsetIssue {
    /// The range is empty or reversed.
    #[serde(rename_all = "camelCase")]
    InvalidRange {
        segment_id: SegmentId,
        start: usize,
        end: usize,
    },

    /// The range runs past the end of the text.
    #[serde(rename_all = "camelCase")]
    OutOfBounds {
        segment_id: SegmentId,
        end: usize,
        len: usize,
    },

    /// The stored content differs from the text under the range.
    #[serde(rename_all = "camelCase")]
    ContentMismatch {
        segment_id: SegmentId,
        start: usize,
        end: usize,
    },
}

impl OffsetIssue {
    pub fn segment_id(&self) -> SegmentId {
        match self {
            Self::InvalidRange { segment_id, .. }
            | Self::OutOfBounds { segment_id, .. }
            | Self::ContentMismatch { segment_id, .. } => *segment_id,
        }
    }
}

impl fmt::Display for OffsetIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange {
                segment_id,
                start,
                end,
            } => write!(f, "segment {segment_id}: invalid range [{start}, {end})"),
            Self::OutOfBounds {
                segment_id,
                end,
                len,
            } => write!(f, "segment {segment_id}: end {end} is past text length {len}"),
            Self::ContentMismatch {
                segment_id,
                start,
                end,
            } => write!(
                f,
                "segment {segment_id}: content no longer matches text at [{start}, {end})"
            ),
        }
    }
}

/// Check every segment against the document's current text.
pub fn audit_offsets(document: &Document, segments: &[Segment]) -> Vec<OffsetIssue> {
    let len = char_len(&document.text);
    segments
        .iter()
        .filter_map(|segment| {
            let (segment_id, start, end) = (segment.id, segment.start, segment.end);
            if end <= start {
                return Some(OffsetIssue::InvalidRange {
                    segment_id,
                    start,
                    end,
                });
            }
            match slice_chars(&document.text, segment.range()) {
                None => Some(OffsetIssue::OutOfBounds {
                    segment_id,
                    end,
                    len,
                }),
                Some(slice) if slice != segment.content => Some(OffsetIssue::ContentMismatch {
                    segment_id,
                    start,
                    end,
                }),
                Some(_) => None,
            }
        })
        .collect()
}
