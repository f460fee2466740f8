//! Client-local scratch state.
//!
//! Ephemeral chunks (duplicated segments), the legacy local folders that
//! predate durable folders, local notes, the recycle bin and per-document
//! migration markers. Everything sits behind one lock and, when the store has a path,
//! is written back as a single JSON file after each change.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use organizer_segments::{DocumentId, Segment, SegmentId, SegmentMode};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{FolderError, Result, StorageError};
use crate::model::{ChunkSnapshot, ItemRef, ItemSource};
use crate::notes::{DocumentNote, SmartNote, SmartNoteDraft};
use crate::recycle::{RecycledChunk, default_retention};

/// A client-side copy of a segment. Durable only once filed into a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralChunk {
    pub id: String,

    /// The segment this chunk was first copied from.
    pub original_id: SegmentId,

    pub document_id: DocumentId,

    pub title: String,

    pub content: String,

    pub mode: SegmentMode,

    #[serde(default)]
    pub is_manual: bool,

    #[serde(default)]
    pub order_index: i64,

    pub created_at: DateTime<Utc>,
}

impl EphemeralChunk {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::Chunk(self.id.clone())
    }

    /// The folder item source filing this chunk would create.
    pub fn source(&self) -> ItemSource {
        ItemSource::Chunk {
            id: self.id.clone(),
            snapshot: ChunkSnapshot {
                title: Some(self.title.clone()),
                content: Some(self.content.clone()),
                mode: Some(self.mode),
                is_manual: self.is_manual,
                order_index: self.order_index,
            },
        }
    }
}

/// A folder from before folders were durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFolder {
    pub id: String,

    pub document_id: DocumentId,

    pub name: String,

    pub created_at: DateTime<Utc>,

    /// Ids of the chunks filed here. Segments are tracked in the folder map.
    #[serde(default)]
    pub contents: Vec<String>,
}

/// A document's local data, as uploaded by migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalExport {
    pub folders: Vec<LocalFolder>,

    /// Segment id (rendered) to local folder id.
    pub folder_map: BTreeMap<String, String>,

    pub chunks: Vec<EphemeralChunk>,

    pub smart_notes: Vec<SmartNote>,

    pub document_note: Option<DocumentNote>,
}

impl LocalExport {
    /// Whether there is nothing worth uploading.
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
            && self.folder_map.is_empty()
            && self.chunks.is_empty()
            && self.smart_notes.is_empty()
            && self.document_note.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalState {
    #[serde(default)]
    chunks: Vec<EphemeralChunk>,

    #[serde(default)]
    folders: Vec<LocalFolder>,

    #[serde(default)]
    folder_maps: BTreeMap<DocumentId, BTreeMap<String, String>>,

    #[serde(default)]
    smart_notes: Vec<SmartNote>,

    #[serde(default)]
    document_notes: BTreeMap<DocumentId, DocumentNote>,

    #[serde(default)]
    recycle_bin: Vec<RecycledChunk>,

    #[serde(default)]
    migrated: BTreeSet<DocumentId>,
}

impl LocalState {
    fn chunk(&self, id: &str) -> Result<&EphemeralChunk> {
        self.chunks
            .iter()
            .find(|chunk| chunk.id == id)
            .ok_or_else(|| FolderError::ChunkNotFound(id.to_string()))
    }

    /// First free `"base (n)"` among the document's chunk titles and `taken`.
    fn unique_title(&self, document_id: DocumentId, source_title: &str) -> String {
        let base = strip_copy_suffix(source_title);
        let mut taken: HashSet<&str> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .map(|chunk| chunk.title.as_str())
            .collect();
        taken.insert(source_title);

        (1..)
            .map(|n| format!("{base} ({n})"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    fn unfile_chunk(&mut self, chunk_id: &str) {
        for folder in &mut self.folders {
            folder.contents.retain(|id| id != chunk_id);
        }
    }
}

/// Strip a trailing `" (n)"` copy counter.
fn strip_copy_suffix(title: &str) -> &str {
    let Some(open) = title.rfind(" (") else {
        return title;
    };
    let Some(counter) = title[open + 2..].strip_suffix(')') else {
        return title;
    };
    if !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit()) {
        &title[..open]
    } else {
        title
    }
}

/// Client-local store.
pub struct LocalStore {
    path: Option<PathBuf>,
    retention: Duration,
    state: RwLock<LocalState>,
}

impl LocalStore {
    /// Open a store persisted at `path`, creating it on first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalState::default(),
            Err(e) => {
                return Err(StorageError::ReadFile(format!("{}: {e}", path.display())).into());
            }
        };
        debug!("Opened local store at {}", path.display());

        Ok(Self {
            path: Some(path),
            retention: default_retention(),
            state: RwLock::new(state),
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            retention: default_retention(),
            state: RwLock::new(LocalState::default()),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Apply `change` to a copy of the state, persist it, then publish it.
    async fn update<T>(&self, change: impl FnOnce(&mut LocalState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let value = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(value)
    }

    async fn persist(&self, state: &LocalState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(state)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    /// Copy a segment into a new ephemeral chunk.
    pub async fn duplicate_segment(&self, segment: &Segment) -> Result<EphemeralChunk> {
        let chunk = self
            .update(|state| {
                let chunk = EphemeralChunk {
                    id: Uuid::new_v4().to_string(),
                    original_id: segment.id,
                    document_id: segment.document_id,
                    title: state.unique_title(segment.document_id, &segment.title),
                    content: segment.content.clone(),
                    mode: segment.mode,
                    is_manual: segment.is_manual,
                    order_index: segment.order_index,
                    created_at: Utc::now(),
                };
                state.chunks.push(chunk.clone());
                Ok(chunk)
            })
            .await?;
        info!("Duplicated segment {} as {:?}", segment.id, chunk.title);
        Ok(chunk)
    }

    /// Copy a chunk. The copy keeps pointing at the original segment.
    pub async fn duplicate_chunk(&self, chunk_id: &str) -> Result<EphemeralChunk> {
        let chunk = self
            .update(|state| {
                let source = state.chunk(chunk_id)?.clone();
                let chunk = EphemeralChunk {
                    id: Uuid::new_v4().to_string(),
                    title: state.unique_title(source.document_id, &source.title),
                    created_at: Utc::now(),
                    ..source
                };
                state.chunks.push(chunk.clone());
                Ok(chunk)
            })
            .await?;
        info!("Duplicated chunk {chunk_id} as {:?}", chunk.title);
        Ok(chunk)
    }

    /// A document's chunks in creation order.
    pub async fn chunks(&self, document_id: DocumentId) -> Vec<EphemeralChunk> {
        self.state
            .read()
            .await
            .chunks
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .cloned()
            .collect()
    }

    pub async fn chunk(&self, chunk_id: &str) -> Option<EphemeralChunk> {
        self.state.read().await.chunk(chunk_id).ok().cloned()
    }

    pub async fn rename_chunk(&self, chunk_id: &str, title: &str) -> Result<EphemeralChunk> {
        let title = title.trim();
        if title.is_empty() {
            return Err(FolderError::Validation(
                "chunk title must not be empty".to_string(),
            ));
        }
        self.update(|state| {
            let chunk = state
                .chunks
                .iter_mut()
                .find(|chunk| chunk.id == chunk_id)
                .ok_or_else(|| FolderError::ChunkNotFound(chunk_id.to_string()))?;
            chunk.title = title.to_string();
            Ok(chunk.clone())
        })
        .await
    }

    pub async fn create_local_folder(
        &self,
        document_id: DocumentId,
        name: &str,
    ) -> Result<LocalFolder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FolderError::Validation(
                "folder name must not be empty".to_string(),
            ));
        }
        self.update(|state| {
            let folder = LocalFolder {
                id: Uuid::new_v4().to_string(),
                document_id,
                name: name.to_string(),
                created_at: Utc::now(),
                contents: Vec::new(),
            };
            state.folders.push(folder.clone());
            Ok(folder)
        })
        .await
    }

    pub async fn local_folders(&self, document_id: DocumentId) -> Vec<LocalFolder> {
        self.state
            .read()
            .await
            .folders
            .iter()
            .filter(|folder| folder.document_id == document_id)
            .cloned()
            .collect()
    }

    /// File a ref into a local folder, taking it out of any other one.
    pub async fn file_locally(
        &self,
        document_id: DocumentId,
        item_ref: &ItemRef,
        local_folder_id: &str,
    ) -> Result<()> {
        self.update(|state| {
            if !state
                .folders
                .iter()
                .any(|folder| folder.id == local_folder_id && folder.document_id == document_id)
            {
                return Err(FolderError::LocalFolderNotFound(local_folder_id.to_string()));
            }

            match item_ref {
                ItemRef::Segment(segment_id) => {
                    state
                        .folder_maps
                        .entry(document_id)
                        .or_default()
                        .insert(segment_id.to_string(), local_folder_id.to_string());
                }
                ItemRef::Chunk(chunk_id) => {
                    state.chunk(chunk_id)?;
                    state.unfile_chunk(chunk_id);
                    if let Some(folder) = state
                        .folders
                        .iter_mut()
                        .find(|folder| folder.id == local_folder_id)
                    {
                        folder.contents.push(chunk_id.clone());
                    }
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn add_smart_note(
        &self,
        document_id: DocumentId,
        draft: SmartNoteDraft,
    ) -> Result<SmartNote> {
        if draft.content.trim().is_empty() {
            return Err(FolderError::Validation(
                "note content must not be empty".to_string(),
            ));
        }
        let note = self
            .update(|state| {
                let note = SmartNote {
                    id: Uuid::new_v4().to_string(),
                    document_id,
                    content: draft.content,
                    html: draft.html,
                    tags: draft.tags,
                    category: draft.category,
                    priority: draft.priority,
                    segment_id: draft.segment_id,
                    created_at: Utc::now(),
                };
                state.smart_notes.push(note.clone());
                Ok(note)
            })
            .await?;
        debug!("Added note {} to document {document_id}", note.id);
        Ok(note)
    }

    pub async fn smart_notes(&self, document_id: DocumentId) -> Vec<SmartNote> {
        self.state
            .read()
            .await
            .smart_notes
            .iter()
            .filter(|note| note.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Delete a note. Returns whether it existed.
    pub async fn delete_smart_note(&self, note_id: &str) -> Result<bool> {
        self.update(|state| {
            let before = state.smart_notes.len();
            state.smart_notes.retain(|note| note.id != note_id);
            Ok(state.smart_notes.len() != before)
        })
        .await
    }

    /// Replace the document note. A blank note clears it.
    pub async fn set_document_note(
        &self,
        document_id: DocumentId,
        html: &str,
        text: &str,
    ) -> Result<Option<DocumentNote>> {
        let note = DocumentNote {
            html: html.to_string(),
            text: text.to_string(),
            updated_at: Utc::now(),
        };
        self.update(|state| {
            if note.is_blank() {
                state.document_notes.remove(&document_id);
                return Ok(None);
            }
            state.document_notes.insert(document_id, note.clone());
            Ok(Some(note))
        })
        .await
    }

    pub async fn document_note(&self, document_id: DocumentId) -> Option<DocumentNote> {
        self.state.read().await.document_notes.get(&document_id).cloned()
    }

    /// Move a chunk to the recycle bin.
    pub async fn recycle_chunk(&self, chunk_id: &str, now: DateTime<Utc>) -> Result<RecycledChunk> {
        let recycled = self
            .update(|state| {
                let chunk = state.chunk(chunk_id)?.clone();
                state.chunks.retain(|c| c.id != chunk_id);
                state.unfile_chunk(chunk_id);
                let recycled = RecycledChunk {
                    chunk,
                    deleted_at: now,
                };
                state.recycle_bin.push(recycled.clone());
                Ok(recycled)
            })
            .await?;
        info!("Recycled chunk {chunk_id}");
        Ok(recycled)
    }

    /// Bring a chunk back from the recycle bin.
    pub async fn restore_chunk(&self, chunk_id: &str) -> Result<EphemeralChunk> {
        let chunk = self
            .update(|state| {
                let position = state
                    .recycle_bin
                    .iter()
                    .position(|entry| entry.chunk.id == chunk_id)
                    .ok_or_else(|| FolderError::ChunkNotFound(chunk_id.to_string()))?;
                let chunk = state.recycle_bin.remove(position).chunk;
                state.chunks.push(chunk.clone());
                Ok(chunk)
            })
            .await?;
        info!("Restored chunk {chunk_id}");
        Ok(chunk)
    }

    pub async fn recycled(&self, document_id: DocumentId) -> Vec<RecycledChunk> {
        self.state
            .read()
            .await
            .recycle_bin
            .iter()
            .filter(|entry| entry.chunk.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Drop recycle bin entries past retention. Returns how many went.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let retention = self.retention;
        let purged = self
            .update(|state| {
                let before = state.recycle_bin.len();
                state
                    .recycle_bin
                    .retain(|entry| !entry.is_expired(now, retention));
                Ok(before - state.recycle_bin.len())
            })
            .await?;
        if purged > 0 {
            info!("Purged {purged} expired chunk(s)");
        }
        Ok(purged)
    }

    pub async fn mark_migrated(&self, document_id: DocumentId) -> Result<()> {
        self.update(|state| {
            state.migrated.insert(document_id);
            Ok(())
        })
        .await
    }

    pub async fn is_migrated(&self, document_id: DocumentId) -> bool {
        self.state.read().await.migrated.contains(&document_id)
    }

    /// Snapshot of everything a document holds locally.
    pub async fn export(&self, document_id: DocumentId) -> LocalExport {
        let state = self.state.read().await;
        LocalExport {
            folders: state
                .folders
                .iter()
                .filter(|folder| folder.document_id == document_id)
                .cloned()
                .collect(),
            folder_map: state
                .folder_maps
                .get(&document_id)
                .cloned()
                .unwrap_or_default(),
            chunks: state
                .chunks
                .iter()
                .filter(|chunk| chunk.document_id == document_id)
                .cloned()
                .collect(),
            smart_notes: state
                .smart_notes
                .iter()
                .filter(|note| note.document_id == document_id)
                .cloned()
                .collect(),
            document_note: state.document_notes.get(&document_id).cloned(),
        }
    }
}
