//! Segment persistence over the transport.

use std::sync::Arc;

use async_trait::async_trait;
use organizer_offsets::{CharRange, TextSelection};
use organizer_transport::{ApiRequest, Transport};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, SegmentError};
use crate::model::{
    DeletedSegment, DeletedSegments, Document, DocumentId, ManualSegment, Segment, SegmentId,
    SegmentListing, SegmentMode, SegmentPatch, SegmentationRun, SegmentationSummary,
};

const RECYCLE_BIN: &str = "/segments/recycle-bin";

/// Largest page the backend serves.
const PAGE_SIZE: usize = 500;

#[derive(Deserialize)]
struct PagedEnvelope {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRef {
    #[serde(default)]
    document_id: Option<DocumentId>,
}

/// Answers whether a segment is still referenced from folders.
#[async_trait]
pub trait ReferenceGuard: Send + Sync {
    /// Number of filed duplicates of `segment` that still sit in a folder.
    async fn filed_duplicates(&self, segment: &Segment) -> Result<usize>;
}

/// A guard for callers without folders.
pub struct NoReferences;

#[async_trait]
impl ReferenceGuard for NoReferences {
    async fn filed_duplicates(&self, _segment: &Segment) -> Result<usize> {
        Ok(0)
    }
}

/// Reads and writes segments.
#[derive(Clone)]
pub struct SegmentStore {
    transport: Arc<Transport>,
}

impl SegmentStore {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// List a document's segments, optionally for one mode.
    ///
    /// Every page is read. A malformed page degrades to no items and ends
    /// the listing.
    pub async fn list_segments(
        &self,
        document_id: DocumentId,
        mode: Option<SegmentMode>,
    ) -> Result<SegmentListing> {
        let mut items: Vec<Segment> = Vec::new();
        let mut page = 1;
        loop {
            let mut request = ApiRequest::get(format!("/documents/{document_id}/segments"));
            if let Some(mode) = mode {
                request = request.with_query("mode", mode);
            }
            let request = request
                .with_query("page", page)
                .with_query("pageSize", PAGE_SIZE);

            let response = self.transport.send(request).await?;
            let batch: Vec<Segment> = response.list_or_empty();
            let total_pages = response
                .json::<PagedEnvelope>()
                .ok()
                .and_then(|envelope| envelope.pagination)
                .map_or(1, |pagination| pagination.total_pages);

            let exhausted = batch.is_empty();
            items.extend(batch);
            if exhausted || page >= total_pages {
                break;
            }
            page += 1;
        }

        for segment in &mut items {
            segment.document_id = document_id;
        }
        debug!("Listed {} segments for document {document_id}", items.len());
        Ok(SegmentListing::new(items, mode))
    }

    /// Get one segment.
    pub async fn get_segment(&self, segment_id: SegmentId) -> Result<Segment> {
        self.fetch_segment(segment_id, false).await
    }

    async fn fetch_segment(&self, segment_id: SegmentId, fresh: bool) -> Result<Segment> {
        let mut request = ApiRequest::get(format!("/segments/{segment_id}"));
        if fresh {
            request = request.fresh();
        }
        Ok(self.transport.fetch(request).await?)
    }

    /// Per-mode segmentation summaries of a document.
    pub async fn list_segmentations(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SegmentationSummary>> {
        let response = self
            .transport
            .send(ApiRequest::get(format!(
                "/documents/{document_id}/segmentations"
            )))
            .await?;
        Ok(response.list_or_empty())
    }

    /// Run automatic segmentation.
    ///
    /// Fails without a network call unless the document finished parsing.
    /// Manual segments of the mode are kept.
    pub async fn run_segmentation(
        &self,
        document: &Document,
        mode: SegmentMode,
    ) -> Result<SegmentationRun> {
        if !document.is_parsed() {
            return Err(SegmentError::NotParsed {
                status: document.parse_status,
            });
        }

        let id = document.id;
        let run: SegmentationRun = self
            .transport
            .fetch(
                ApiRequest::post(format!("/documents/{id}/segment"))
                    .with_query("mode", mode)
                    .invalidating(format!("/documents/{id}/segments"))
                    .invalidating(format!("/documents/{id}/segmentations")),
            )
            .await?;
        info!("Segmented document {id} ({mode}): {} segments", run.count);
        Ok(run)
    }

    /// Delete a document's segments, automatic ones only unless
    /// `include_manual` is set.
    pub async fn delete_by_mode(
        &self,
        document_id: DocumentId,
        mode: Option<SegmentMode>,
        include_manual: bool,
    ) -> Result<DeletedSegments> {
        let mut request = ApiRequest::delete(format!("/documents/{document_id}/segments"));
        if let Some(mode) = mode {
            request = request.with_query("mode", mode);
        }
        let request = request.with_query("include_manual", include_manual);

        let deleted: DeletedSegments = self.transport.fetch(request).await?;
        info!("Cleared segments of document {document_id}: {deleted}");
        Ok(deleted)
    }

    /// Create a manual segment. `end <= start` is rejected before any network
    /// call; the backend checks the upper bound.
    pub async fn create_manual_segment(
        &self,
        document_id: DocumentId,
        segment: ManualSegment,
    ) -> Result<Segment> {
        CharRange::new(segment.start, segment.end)?;
        self.post_manual(document_id, segment).await
    }

    /// Create a manual segment inside a loaded document, checking both bounds
    /// locally.
    pub async fn create_manual_segment_in(
        &self,
        document: &Document,
        segment: ManualSegment,
    ) -> Result<Segment> {
        CharRange::within(segment.start, segment.end, document.char_len())?;
        self.post_manual(document.id, segment).await
    }

    /// File a translated selection as a manual segment.
    pub async fn create_from_selection(
        &self,
        document: &Document,
        selection: &TextSelection,
        mode: SegmentMode,
        title: Option<String>,
    ) -> Result<Segment> {
        let segment = ManualSegment {
            mode,
            title,
            start: selection.start,
            end: selection.end,
        };
        self.create_manual_segment_in(document, segment).await
    }

    async fn post_manual(&self, document_id: DocumentId, segment: ManualSegment) -> Result<Segment> {
        let mut created: Segment = self
            .transport
            .fetch(
                ApiRequest::post(format!("/documents/{document_id}/segments/manual"))
                    .with_json(&segment)?
                    .invalidating(format!("/documents/{document_id}/segmentations")),
            )
            .await?;
        created.document_id = document_id;
        info!(
            "Created manual segment {} [{}, {}) in document {document_id}",
            created.id, created.start, created.end
        );
        Ok(created)
    }

    /// Apply a partial update.
    ///
    /// When only one bound is given the other comes from the current segment,
    /// and the resulting range is checked before the update is sent.
    pub async fn patch_segment(&self, segment_id: SegmentId, patch: SegmentPatch) -> Result<Segment> {
        if patch.is_empty() {
            return Err(SegmentError::Validation("nothing to update".to_string()));
        }

        let mut known_document = None;
        let patch = match (patch.start, patch.end) {
            (Some(start), Some(end)) => {
                CharRange::new(start, end)?;
                patch
            }
            (Some(_), None) | (None, Some(_)) => {
                let current = self.fetch_segment(segment_id, true).await?;
                known_document = Some(current.document_id).filter(|id| *id != 0);
                let start = patch.start.unwrap_or(current.start);
                let end = patch.end.unwrap_or(current.end);
                CharRange::new(start, end)?;
                SegmentPatch {
                    start: Some(start),
                    end: Some(end),
                    ..patch
                }
            }
            (None, None) => patch,
        };

        let response = self
            .transport
            .send(ApiRequest::patch(format!("/segments/{segment_id}")).with_json(&patch)?)
            .await?;

        // The update is applied once the call succeeds, whatever the body.
        let document_id = response
            .json::<DocumentRef>()
            .ok()
            .and_then(|owner| owner.document_id)
            .or(known_document);
        match document_id {
            Some(document_id) => self.invalidate_document(document_id).await,
            None => {
                self.transport.invalidate(&["/documents"]).await;
            }
        }

        let updated: Segment = response.json()?;
        info!("Updated segment {segment_id}");
        Ok(updated)
    }

    /// Delete a segment unless filed duplicates of it remain in folders.
    pub async fn delete_segment(
        &self,
        segment_id: SegmentId,
        guard: &dyn ReferenceGuard,
    ) -> Result<()> {
        let segment = self.fetch_segment(segment_id, true).await?;
        let duplicates = guard.filed_duplicates(&segment).await?;
        if duplicates > 0 {
            return Err(SegmentError::StillReferenced {
                segment_id,
                duplicates,
            });
        }

        self.transport
            .send(ApiRequest::delete(format!("/segments/{segment_id}")))
            .await?;
        self.invalidate_document(segment.document_id).await;
        info!("Deleted segment {segment_id}");
        Ok(())
    }

    /// Soft-deleted segments of every document, most recent first.
    pub async fn list_recycled_segments(&self) -> Result<Vec<DeletedSegment>> {
        let response = self.transport.send(ApiRequest::get(RECYCLE_BIN)).await?;
        Ok(response.list_or_empty())
    }

    /// Bring a soft-deleted segment back into its document.
    pub async fn restore_segment(&self, segment_id: SegmentId) -> Result<Segment> {
        self.transport
            .send(
                ApiRequest::post(format!("/segments/{segment_id}/restore"))
                    .invalidating(format!("/segments/{segment_id}"))
                    .invalidating(RECYCLE_BIN),
            )
            .await?;
        let segment = self.fetch_segment(segment_id, true).await?;
        self.invalidate_document(segment.document_id).await;
        info!("Restored segment {segment_id}");
        Ok(segment)
    }

    /// Permanently delete a segment that is already in the recycle bin.
    pub async fn purge_segment(&self, segment_id: SegmentId) -> Result<()> {
        self.transport
            .send(
                ApiRequest::delete(format!("/segments/{segment_id}/purge"))
                    .invalidating(RECYCLE_BIN),
            )
            .await?;
        info!("Purged segment {segment_id}");
        Ok(())
    }

    async fn invalidate_document(&self, document_id: DocumentId) {
        self.transport
            .invalidate(&[
                format!("/documents/{document_id}/segments"),
                format!("/documents/{document_id}/segmentations"),
            ])
            .await;
    }
}
