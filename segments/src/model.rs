//! Documents, segments and the wire shapes around them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use organizer_offsets::{CharRange, char_len};
use organizer_transport::timestamp;
use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

pub type DocumentId = i64;
pub type SegmentId = i64;

/// Where a document is in the ingestion pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    #[default]
    Pending,
    Ok,
    Failed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        })
    }
}

/// A source document. Segments point into `text` by character offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub parse_status: ParseStatus,

    #[serde(default)]
    pub parse_error: Option<String>,
}

impl Document {
    /// Whether the document can be segmented.
    pub fn is_parsed(&self) -> bool {
        self.parse_status == ParseStatus::Ok
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }
}

/// Segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    Qa,
    Paragraphs,
}

impl SegmentMode {
    pub const ALL: [SegmentMode; 2] = [SegmentMode::Qa, SegmentMode::Paragraphs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::Paragraphs => "paragraphs",
        }
    }
}

impl fmt::Display for SegmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentMode {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qa" => Ok(Self::Qa),
            "paragraphs" => Ok(Self::Paragraphs),
            other => Err(SegmentError::Validation(format!(
                "unknown mode {other:?}, expected qa or paragraphs"
            ))),
        }
    }
}

/// A durable, offset-anchored unit of a document.
///
/// `content` is a copy of the text at creation time; `start..end` is the
/// half-open character range it was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,

    /// Absent from list payloads; filled in by the store.
    #[serde(default)]
    pub document_id: DocumentId,

    pub mode: SegmentMode,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    pub start: usize,

    pub end: usize,

    #[serde(default)]
    pub is_manual: bool,

    #[serde(default)]
    pub order_index: i64,

    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Segment {
    /// The segment's character range.
    pub fn range(&self) -> CharRange {
        CharRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// A segment list plus its summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentListing {
    pub items: Vec<Segment>,
    pub meta: SegmentMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentMeta {
    /// Number of listed segments.
    pub count: usize,

    /// Mode filter of the listing; `None` lists every mode.
    pub mode: Option<SegmentMode>,

    /// Newest creation time among automatic segments. Manual segments never
    /// move it.
    pub last_run: Option<DateTime<Utc>>,
}

impl SegmentListing {
    pub(crate) fn new(items: Vec<Segment>, mode: Option<SegmentMode>) -> Self {
        let last_run = items
            .iter()
            .filter(|segment| !segment.is_manual)
            .filter_map(|segment| segment.created_at)
            .max();
        Self {
            meta: SegmentMeta {
                count: items.len(),
                mode,
                last_run,
            },
            items,
        }
    }

    pub fn manual(&self) -> impl Iterator<Item = &Segment> {
        self.items.iter().filter(|segment| segment.is_manual)
    }

    pub fn automatic(&self) -> impl Iterator<Item = &Segment> {
        self.items.iter().filter(|segment| !segment.is_manual)
    }
}

/// A user-drawn segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSegment {
    pub mode: SegmentMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub start: usize,

    pub end: usize,
}

impl ManualSegment {
    pub fn new(mode: SegmentMode, start: usize, end: usize) -> Self {
        Self {
            mode,
            title: None,
            start,
            end,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Partial segment update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SegmentPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: usize) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.start.is_none() && self.end.is_none() && self.content.is_none()
    }
}

/// Result of an automatic segmentation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationRun {
    pub document_id: DocumentId,
    pub mode: SegmentMode,
    #[serde(default)]
    pub count: usize,
}

/// Per-mode segmentation summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationSummary {
    pub mode: SegmentMode,

    #[serde(default)]
    pub count: usize,

    #[serde(default, with = "timestamp::option")]
    pub last_segmented_at: Option<DateTime<Utc>>,
}

/// Result of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSegments {
    #[serde(default)]
    pub deleted: Option<u64>,

    #[serde(default)]
    pub include_manual: bool,
}

impl fmt::Display for DeletedSegments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.deleted {
            Some(count) => write!(f, "Deleted {count} segment(s)"),
            None => f.write_str("Deleted segments"),
        }
    }
}

/// A soft-deleted segment waiting in the server's recycle bin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSegment {
    pub id: SegmentId,

    pub document_id: DocumentId,

    #[serde(default)]
    pub document_title: String,

    #[serde(default)]
    pub title: String,

    /// Preview only; long contents arrive truncated.
    #[serde(default)]
    pub content: String,

    pub mode: SegmentMode,

    #[serde(default)]
    pub is_manual: bool,

    #[serde(with = "timestamp")]
    pub deleted_at: DateTime<Utc>,
}
