//! Folders, folder items and the folder map.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use organizer_segments::{DocumentId, SegmentId, SegmentMode};
use organizer_transport::timestamp;
use serde::{Deserialize, Serialize};

use crate::error::FolderError;

pub type FolderId = i64;
pub type FolderItemId = i64;

/// Namespace prefix of chunk refs.
const CHUNK_PREFIX: &str = "chunk:";

/// A named container of segments and chunks within one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,

    pub document_id: DocumentId,

    pub name: String,

    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub item_count: usize,
}

/// A folder together with its live items.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FolderContents {
    #[serde(flatten)]
    pub folder: Folder,

    #[serde(default)]
    pub items: Vec<FolderItem>,
}

impl FolderContents {
    /// The item filed under `item_ref`, if any.
    pub fn item_for(&self, item_ref: &ItemRef) -> Option<&FolderItem> {
        self.items.iter().find(|item| item.source.item_ref() == *item_ref)
    }
}

/// Content copied from a chunk when it is filed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSnapshot {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mode: Option<SegmentMode>,
    pub is_manual: bool,
    pub order_index: i64,
}

/// What a folder item points at. Exactly one source per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    Segment(SegmentId),
    Chunk { id: String, snapshot: ChunkSnapshot },
}

impl ItemSource {
    pub fn item_ref(&self) -> ItemRef {
        match self {
            Self::Segment(id) => ItemRef::Segment(*id),
            Self::Chunk { id, .. } => ItemRef::Chunk(id.clone()),
        }
    }
}

/// A filed item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "FolderItemRecord")]
pub struct FolderItem {
    pub id: FolderItemId,
    pub folder_id: FolderId,
    pub source: ItemSource,
    pub created_at: Option<DateTime<Utc>>,
}

/// Flat wire form of a folder item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FolderItemRecord {
    #[serde(default, skip_serializing)]
    pub id: FolderItemId,

    pub folder_id: FolderId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<SegmentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_mode: Option<SegmentMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_is_manual: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_order_index: Option<i64>,

    #[serde(default, skip_serializing, deserialize_with = "timestamp::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

impl FolderItemRecord {
    /// Request body filing `source` into `folder_id`.
    pub(crate) fn new_item(folder_id: FolderId, source: &ItemSource) -> Self {
        match source {
            ItemSource::Segment(segment_id) => Self {
                folder_id,
                segment_id: Some(*segment_id),
                ..Self::default()
            },
            ItemSource::Chunk { id, snapshot } => Self {
                folder_id,
                chunk_id: Some(id.clone()),
                chunk_title: snapshot.title.clone(),
                chunk_content: snapshot.content.clone(),
                chunk_mode: snapshot.mode,
                chunk_is_manual: Some(snapshot.is_manual),
                chunk_order_index: Some(snapshot.order_index),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<FolderItemRecord> for FolderItem {
    type Error = String;

    fn try_from(record: FolderItemRecord) -> Result<Self, Self::Error> {
        let source = match (record.segment_id, record.chunk_id) {
            (Some(segment_id), None) => ItemSource::Segment(segment_id),
            (None, Some(id)) => ItemSource::Chunk {
                id,
                snapshot: ChunkSnapshot {
                    title: record.chunk_title,
                    content: record.chunk_content,
                    mode: record.chunk_mode,
                    is_manual: record.chunk_is_manual.unwrap_or_default(),
                    order_index: record.chunk_order_index.unwrap_or_default(),
                },
            },
            (Some(_), Some(_)) => {
                return Err(format!(
                    "folder item {} references both a segment and a chunk",
                    record.id
                ));
            }
            (None, None) => {
                return Err(format!("folder item {} has no content source", record.id));
            }
        };

        Ok(Self {
            id: record.id,
            folder_id: record.folder_id,
            source,
            created_at: record.created_at,
        })
    }
}

/// Folder-map key. Segment refs render as the bare id, chunk refs carry a
/// `chunk:` prefix, so the two never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemRef {
    Segment(SegmentId),
    Chunk(String),
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment(id) => write!(f, "{id}"),
            Self::Chunk(id) => write!(f, "{CHUNK_PREFIX}{id}"),
        }
    }
}

impl FromStr for ItemRef {
    type Err = FolderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(CHUNK_PREFIX) {
            if id.is_empty() {
                return Err(FolderError::Validation("empty chunk id".to_string()));
            }
            return Ok(Self::Chunk(id.to_string()));
        }
        s.parse()
            .map(Self::Segment)
            .map_err(|_| FolderError::Validation(format!("invalid item ref {s:?}")))
    }
}

/// Projection of live folder items: which folder holds each ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMap {
    entries: BTreeMap<ItemRef, FolderId>,
}

impl FolderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `item_ref` in `folder_id`. The first holder wins.
    pub(crate) fn insert(&mut self, item_ref: ItemRef, folder_id: FolderId) -> bool {
        match self.entries.entry(item_ref) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(folder_id);
                true
            }
        }
    }

    pub fn get(&self, item_ref: &ItemRef) -> Option<FolderId> {
        self.entries.get(item_ref).copied()
    }

    /// Look up by rendered key (`"7"`, `"chunk:abc"`).
    pub fn get_key(&self, key: &str) -> Option<FolderId> {
        key.parse().ok().and_then(|item_ref| self.get(&item_ref))
    }

    /// Whether any ref sits in `folder_id`.
    pub fn contains_folder(&self, folder_id: FolderId) -> bool {
        self.entries.values().any(|id| *id == folder_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemRef, FolderId)> {
        self.entries.iter().map(|(item_ref, id)| (item_ref, *id))
    }
}

/// Result of removing a ref from a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Removed; the folder still holds other items.
    Removed { folder_id: FolderId },

    /// Removed, and the emptied folder no longer exists.
    RemovedAndFolderDeleted { folder_id: FolderId },

    /// The ref was not in the folder.
    NotPresent,
}

impl RemoveOutcome {
    /// Whether a view of the folder must be abandoned.
    pub fn folder_auto_deleted(&self) -> bool {
        matches!(self, Self::RemovedAndFolderDeleted { .. })
    }
}

impl fmt::Display for RemoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed { folder_id } => write!(f, "Removed from folder {folder_id}"),
            Self::RemovedAndFolderDeleted { folder_id } => {
                write!(f, "Removed from folder {folder_id}; the folder was empty and has been deleted")
            }
            Self::NotPresent => f.write_str("Item was not in the folder"),
        }
    }
}

/// Result of assigning a ref to a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// The ref now sits in `folder_id`, after leaving the listed folders.
    Filed {
        folder_id: FolderId,
        moved_from: Vec<RemoveOutcome>,
    },

    /// The ref already sat in `folder_id` and nowhere else.
    Unchanged { folder_id: FolderId },

    /// The ref was taken out of every folder.
    Unfiled { removed: Vec<RemoveOutcome> },
}

impl Assignment {
    /// Whether a folder disappeared as a side effect.
    pub fn folder_auto_deleted(&self) -> bool {
        match self {
            Self::Filed { moved_from, .. } => moved_from.iter().any(RemoveOutcome::folder_auto_deleted),
            Self::Unfiled { removed } => removed.iter().any(RemoveOutcome::folder_auto_deleted),
            Self::Unchanged { .. } => false,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filed {
                folder_id,
                moved_from,
            } => {
                write!(f, "Filed in folder {folder_id}")?;
                let previous: Vec<String> = moved_from
                    .iter()
                    .filter_map(|outcome| match outcome {
                        RemoveOutcome::Removed { folder_id }
                        | RemoveOutcome::RemovedAndFolderDeleted { folder_id } => {
                            Some(folder_id.to_string())
                        }
                        RemoveOutcome::NotPresent => None,
                    })
                    .collect();
                if !previous.is_empty() {
                    write!(f, " (moved from {})", previous.join(", "))?;
                }
                Ok(())
            }
            Self::Unchanged { folder_id } => write!(f, "Already in folder {folder_id}"),
            Self::Unfiled { removed } if removed.is_empty() => f.write_str("Not in any folder"),
            Self::Unfiled { removed } => {
                let messages: Vec<String> = removed.iter().map(ToString::to_string).collect();
                f.write_str(&messages.join("; "))
            }
        }
    }
}

/// Body of a folder item deletion. Older servers answer `{ok}` only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeletedItem {
    #[serde(default)]
    pub folder_also_deleted: Option<bool>,
}

/// A soft-deleted folder waiting in the server's recycle bin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedFolder {
    pub id: FolderId,

    pub name: String,

    pub document_id: DocumentId,

    #[serde(default)]
    pub document_title: String,

    #[serde(with = "timestamp")]
    pub deleted_at: DateTime<Utc>,
}

/// Result of bringing a folder back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRestore {
    pub folder_id: FolderId,

    /// Refs left out because another folder picked them up meanwhile.
    pub dropped: Vec<ItemRef>,

    /// Nothing was left after dropping, so the folder went away again.
    pub folder_deleted: bool,
}

impl fmt::Display for FolderRestore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Restored folder {}", self.folder_id)?;
        if !self.dropped.is_empty() {
            write!(f, "; {} item(s) now filed elsewhere were left out", self.dropped.len())?;
        }
        if self.folder_deleted {
            f.write_str("; the folder was left empty and has been deleted")?;
        }
        Ok(())
    }
}
