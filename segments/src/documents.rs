//! Document reads and whole-text replacement.

use std::sync::Arc;

use organizer_transport::{ApiRequest, Transport};
use serde_json::json;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Document, DocumentId};

/// Access to source documents.
#[derive(Clone)]
pub struct DocumentStore {
    transport: Arc<Transport>,
}

impl DocumentStore {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn get_document(&self, document_id: DocumentId) -> Result<Document> {
        Ok(self
            .transport
            .fetch(ApiRequest::get(format!("/documents/{document_id}")))
            .await?)
    }

    /// Replace the document text in one step.
    ///
    /// Existing segment offsets are not re-validated; see
    /// [`audit_offsets`](crate::audit_offsets).
    pub async fn replace_text(&self, document_id: DocumentId, text: &str) -> Result<Document> {
        let document: Document = self
            .transport
            .fetch(ApiRequest::patch(format!("/documents/{document_id}")).with_body(json!({ "text": text })))
            .await?;
        if document.text != text {
            warn!("Document {document_id} text differs from what was sent");
        }
        info!(
            "Replaced text of document {document_id} ({} chars)",
            document.char_len()
        );
        Ok(document)
    }
}
