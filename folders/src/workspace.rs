//! One handle over segments, folders, local state and migration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use organizer_segments::{
    DocumentId, DocumentStore, ReferenceGuard, Segment, SegmentError, SegmentId, SegmentStore,
};
use organizer_transport::Transport;
use tracing::info;

use crate::error::{FolderError, Result};
use crate::local::{EphemeralChunk, LocalStore};
use crate::migration::{MigrationOutcome, Migrator};
use crate::model::{Assignment, FolderId};
use crate::recycle::RecycledChunk;
use crate::service::FolderService;

/// Everything a document view needs, sharing one transport.
#[derive(Clone)]
pub struct Workspace {
    segments: SegmentStore,
    documents: DocumentStore,
    folders: FolderService,
    local: Arc<LocalStore>,
    migrator: Migrator,
}

impl Workspace {
    pub fn new(transport: Arc<Transport>, local: Arc<LocalStore>) -> Self {
        let folders = FolderService::new(Arc::clone(&transport));
        Self {
            segments: SegmentStore::new(Arc::clone(&transport)),
            documents: DocumentStore::new(transport),
            migrator: Migrator::new(folders.clone()),
            folders,
            local,
        }
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn folders(&self) -> &FolderService {
        &self.folders
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Delete a segment unless a duplicate of it is still filed.
    pub async fn delete_segment(&self, segment_id: SegmentId) -> Result<()> {
        let segment = self.segments.get_segment(segment_id).await?;
        self.segments.delete_segment(segment_id, self).await?;
        self.folders.invalidate(segment.document_id, None).await;
        Ok(())
    }

    pub async fn duplicate_segment(&self, segment_id: SegmentId) -> Result<EphemeralChunk> {
        let segment = self.segments.get_segment(segment_id).await?;
        self.local.duplicate_segment(&segment).await
    }

    /// File a local chunk into a durable folder, or unfile it with `None`.
    pub async fn file_chunk(&self, chunk_id: &str, target: Option<FolderId>) -> Result<Assignment> {
        let chunk = self.chunk(chunk_id).await?;
        self.folders
            .assign_to_folder(chunk.document_id, &chunk.source(), target)
            .await
    }

    /// Unfile a chunk everywhere, then move it to the recycle bin.
    pub async fn discard_chunk(
        &self,
        document_id: DocumentId,
        chunk_id: &str,
    ) -> Result<RecycledChunk> {
        let chunk = self.chunk(chunk_id).await?;
        if chunk.document_id != document_id {
            return Err(FolderError::ChunkNotFound(chunk_id.to_string()));
        }

        let unfiled = self
            .folders
            .assign_to_folder(document_id, &chunk.source(), None)
            .await?;
        info!("Discarding chunk {chunk_id}: {unfiled}");
        self.local.recycle_chunk(chunk_id, Utc::now()).await
    }

    pub async fn restore_chunk(&self, chunk_id: &str) -> Result<EphemeralChunk> {
        self.local.restore_chunk(chunk_id).await
    }

    pub async fn purge_recycled(&self) -> Result<usize> {
        self.local.purge_expired(Utc::now()).await
    }

    pub async fn migrate(&self, document_id: DocumentId) -> Result<MigrationOutcome> {
        self.migrator
            .migrate_local_to_durable(document_id, &self.local)
            .await
    }

    async fn chunk(&self, chunk_id: &str) -> Result<EphemeralChunk> {
        self.local
            .chunk(chunk_id)
            .await
            .ok_or_else(|| FolderError::ChunkNotFound(chunk_id.to_string()))
    }
}

#[async_trait]
impl ReferenceGuard for Workspace {
    async fn filed_duplicates(&self, segment: &Segment) -> organizer_segments::Result<usize> {
        let duplicates: Vec<EphemeralChunk> = self
            .local
            .chunks(segment.document_id)
            .await
            .into_iter()
            .filter(|chunk| chunk.original_id == segment.id)
            .collect();
        if duplicates.is_empty() {
            return Ok(0);
        }

        let map = self
            .folders
            .load_folder_map(segment.document_id)
            .await
            .map_err(SegmentError::from)?;
        Ok(duplicates
            .iter()
            .filter(|chunk| map.get(&chunk.item_ref()).is_some())
            .count())
    }
}
