//! One-time upload of local folders into durable storage.
//!
//! Each document moves through `NotMigrated → Migrating → Migrated`. A
//! document that already has durable folders is never uploaded again, so a
//! retried or concurrent migration cannot import twice.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use organizer_segments::{DocumentId, SegmentMode};
use organizer_transport::ApiRequest;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::local::{LocalExport, LocalStore};
use crate::notes::{DocumentNote, SmartNote};
use crate::service::FolderService;

/// Where a document stands in the migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MigrationState {
    #[default]
    NotMigrated,
    Migrating,
    Migrated,
}

/// Result of a migration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    AlreadyMigrated,
    InProgress,
    NothingToMigrate,
    Imported(ImportSummary),
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyMigrated => f.write_str("Already migrated"),
            Self::InProgress => f.write_str("Migration already in progress"),
            Self::NothingToMigrate => f.write_str("Nothing to migrate"),
            Self::Imported(summary) => write!(f, "{summary}"),
        }
    }
}

/// What the backend imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    #[serde(default)]
    pub folders: u64,

    #[serde(default)]
    pub folder_items: u64,

    #[serde(default)]
    pub smart_notes: u64,

    #[serde(default)]
    pub document_note: bool,

    #[serde(skip)]
    pub message: Option<String>,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} folder(s) and {} item(s)",
            self.folders, self.folder_items
        )?;
        if self.smart_notes > 0 {
            write!(f, ", {} note(s)", self.smart_notes)?;
        }
        if self.document_note {
            f.write_str(" and the document note")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ImportResponse {
    #[serde(default)]
    imported: ImportSummary,

    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationPayload {
    document_id: DocumentId,
    folders: Vec<FolderPayload>,
    folder_map: BTreeMap<String, String>,
    duplicated_chunks: Vec<ChunkPayload>,
    smart_notes: Vec<NotePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_note: Option<DocumentNotePayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FolderPayload {
    id: String,
    name: String,
    created_at: i64,
    contents: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkPayload {
    id: String,
    title: String,
    content: String,
    mode: SegmentMode,
    is_manual: bool,
    order_index: i64,
    created_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotePayload {
    content: String,
    html: String,
    tags: Vec<String>,
    category: String,
    priority: String,
    chunk_id: Option<i64>,
    timestamp: String,
}

impl From<SmartNote> for NotePayload {
    fn from(note: SmartNote) -> Self {
        Self {
            content: note.content,
            html: note.html,
            tags: note.tags,
            category: note.category,
            priority: note.priority.to_string(),
            chunk_id: note.segment_id,
            timestamp: note.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentNotePayload {
    html: String,
    text: String,
}

impl From<DocumentNote> for DocumentNotePayload {
    fn from(note: DocumentNote) -> Self {
        Self {
            html: note.html,
            text: note.text,
        }
    }
}

impl MigrationPayload {
    fn new(document_id: DocumentId, export: LocalExport) -> Self {
        Self {
            document_id,
            folders: export
                .folders
                .into_iter()
                .map(|folder| FolderPayload {
                    id: folder.id,
                    name: folder.name,
                    created_at: folder.created_at.timestamp_millis(),
                    contents: folder.contents,
                })
                .collect(),
            folder_map: export.folder_map,
            duplicated_chunks: export
                .chunks
                .into_iter()
                .map(|chunk| ChunkPayload {
                    id: chunk.id,
                    title: chunk.title,
                    content: chunk.content,
                    mode: chunk.mode,
                    is_manual: chunk.is_manual,
                    order_index: chunk.order_index,
                    created_at: chunk.created_at.timestamp_millis(),
                })
                .collect(),
            smart_notes: export.smart_notes.into_iter().map(NotePayload::from).collect(),
            document_note: export.document_note.map(DocumentNotePayload::from),
        }
    }
}

/// Runs migrations and remembers each document's state.
#[derive(Clone)]
pub struct Migrator {
    folders: FolderService,
    states: Arc<Mutex<HashMap<DocumentId, MigrationState>>>,
}

impl Migrator {
    pub fn new(folders: FolderService) -> Self {
        Self {
            folders,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn state(&self, document_id: DocumentId) -> MigrationState {
        self.states
            .lock()
            .await
            .get(&document_id)
            .copied()
            .unwrap_or_default()
    }

    async fn set_state(&self, document_id: DocumentId, state: MigrationState) {
        self.states.lock().await.insert(document_id, state);
    }

    /// Upload the document's local folders unless durable ones exist.
    pub async fn migrate_local_to_durable(
        &self,
        document_id: DocumentId,
        local: &LocalStore,
    ) -> Result<MigrationOutcome> {
        let marked = local.is_migrated(document_id).await;
        {
            let mut states = self.states.lock().await;
            let state = states.entry(document_id).or_default();
            match *state {
                MigrationState::Migrated => return Ok(MigrationOutcome::AlreadyMigrated),
                MigrationState::Migrating => return Ok(MigrationOutcome::InProgress),
                MigrationState::NotMigrated if marked => {
                    *state = MigrationState::Migrated;
                    return Ok(MigrationOutcome::AlreadyMigrated);
                }
                MigrationState::NotMigrated => *state = MigrationState::Migrating,
            }
        }

        match self.run(document_id, local).await {
            Ok(outcome) => {
                let state = match outcome {
                    MigrationOutcome::NothingToMigrate => MigrationState::NotMigrated,
                    _ => MigrationState::Migrated,
                };
                self.set_state(document_id, state).await;
                Ok(outcome)
            }
            Err(e) => {
                warn!("Migration of document {document_id} failed: {e}");
                self.set_state(document_id, MigrationState::NotMigrated)
                    .await;
                Err(e)
            }
        }
    }

    async fn run(&self, document_id: DocumentId, local: &LocalStore) -> Result<MigrationOutcome> {
        let durable = self.folders.list_folders_authoritative(document_id).await?;
        if !durable.is_empty() {
            debug!(
                "Document {document_id} already has {} durable folder(s)",
                durable.len()
            );
            local.mark_migrated(document_id).await?;
            return Ok(MigrationOutcome::AlreadyMigrated);
        }

        let export = local.export(document_id).await;
        if export.is_empty() {
            return Ok(MigrationOutcome::NothingToMigrate);
        }

        info!(
            "Migrating document {document_id}: {} folder(s), {} chunk(s), {} note(s)",
            export.folders.len(),
            export.chunks.len(),
            export.smart_notes.len()
        );
        let payload = MigrationPayload::new(document_id, export);
        let response: ImportResponse = self
            .folders
            .transport()
            .fetch(
                ApiRequest::post(format!("/documents/{document_id}/migrate-localstorage"))
                    .with_json(&payload)?,
            )
            .await?;

        local.mark_migrated(document_id).await?;
        self.folders.invalidate(document_id, None).await;

        let summary = ImportSummary {
            message: response.message,
            ..response.imported
        };
        info!("Migrated document {document_id}: {summary}");
        Ok(MigrationOutcome::Imported(summary))
    }
}
