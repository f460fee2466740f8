//! Notes kept locally until a document is migrated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use organizer_segments::{DocumentId, SegmentId};
use serde::{Deserialize, Serialize};

use crate::error::FolderError;

/// Category given to notes created without one.
pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotePriority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for NotePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

impl FromStr for NotePriority {
    type Err = FolderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(FolderError::Validation(format!(
                "unknown priority {other:?}, expected low, medium or high"
            ))),
        }
    }
}

/// A tagged note about a document, optionally pinned to a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartNote {
    pub id: String,

    pub document_id: DocumentId,

    pub content: String,

    #[serde(default)]
    pub html: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub category: String,

    #[serde(default)]
    pub priority: NotePriority,

    #[serde(default)]
    pub segment_id: Option<SegmentId>,

    pub created_at: DateTime<Utc>,
}

/// Fields of a note about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartNoteDraft {
    pub content: String,
    pub html: String,
    pub tags: Vec<String>,
    pub category: String,
    pub priority: NotePriority,
    pub segment_id: Option<SegmentId>,
}

impl SmartNoteDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            html: String::new(),
            tags: Vec::new(),
            category: DEFAULT_CATEGORY.to_string(),
            priority: NotePriority::default(),
            segment_id: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_priority(mut self, priority: NotePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_segment(mut self, segment_id: SegmentId) -> Self {
        self.segment_id = Some(segment_id);
        self
    }
}

/// The single free-form note of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNote {
    pub html: String,

    pub text: String,

    pub updated_at: DateTime<Utc>,
}

impl DocumentNote {
    /// Whether the note holds no text at all.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.html.trim().is_empty()
    }
}
