//! Durable folders over the transport.
//!
//! Every mutation invalidates the document's folder list, the touched
//! folder's items and the stored folder-map projection before it returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use organizer_segments::DocumentId;
use organizer_transport::{ApiRequest, Transport};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{FolderError, Result};
use crate::model::{
    Assignment, DeletedFolder, DeletedItem, Folder, FolderContents, FolderId, FolderItem,
    FolderItemRecord, FolderMap, FolderRestore, ItemRef, ItemSource, RemoveOutcome,
};

const RECYCLE_BIN: &str = "/folders/recycle-bin";

/// Stored folder maps, one per document.
#[derive(Default)]
struct Projections {
    maps: HashMap<DocumentId, FolderMap>,

    /// Bumped whenever a document's map is dropped. A map built from reads
    /// that straddle a bump is never stored.
    generations: HashMap<DocumentId, u64>,
}

impl Projections {
    fn generation(&self, document_id: DocumentId) -> u64 {
        self.generations.get(&document_id).copied().unwrap_or_default()
    }
}

/// Folder operations for every document.
#[derive(Clone)]
pub struct FolderService {
    transport: Arc<Transport>,
    projections: Arc<RwLock<Projections>>,
}

impl FolderService {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            projections: Arc::new(RwLock::new(Projections::default())),
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// A document's folders. A malformed payload degrades to no folders.
    pub async fn list_folders(&self, document_id: DocumentId) -> Result<Vec<Folder>> {
        let response = self
            .transport
            .send(ApiRequest::get(folders_path(document_id)))
            .await?;
        Ok(response.list_or_empty())
    }

    /// A document's folders, read from the backend and decoded strictly.
    pub(crate) async fn list_folders_authoritative(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<Folder>> {
        let response = self
            .transport
            .send(ApiRequest::get(folders_path(document_id)).fresh())
            .await?;
        Ok(response.list()?)
    }

    /// A folder and its items.
    pub async fn get_folder(&self, folder_id: FolderId) -> Result<FolderContents> {
        Ok(self
            .transport
            .fetch(ApiRequest::get(format!("/folders/{folder_id}")))
            .await?)
    }

    async fn get_folder_fresh(&self, folder_id: FolderId) -> Result<FolderContents> {
        Ok(self
            .transport
            .fetch(ApiRequest::get(format!("/folders/{folder_id}")).fresh())
            .await?)
    }

    pub async fn create_folder(&self, document_id: DocumentId, name: &str) -> Result<Folder> {
        let name = validate_name(name)?;
        let folder: Folder = self
            .transport
            .fetch(
                ApiRequest::post("/folders")
                    .with_body(json!({ "documentId": document_id, "name": name }))
                    .invalidating(folders_path(document_id)),
            )
            .await?;
        self.forget_projection(document_id).await;
        info!("Created folder {} ({name}) in document {document_id}", folder.id);
        Ok(folder)
    }

    pub async fn rename_folder(&self, folder_id: FolderId, name: &str) -> Result<Folder> {
        let name = validate_name(name)?;
        let folder: Folder = self
            .transport
            .fetch(ApiRequest::patch(format!("/folders/{folder_id}")).with_query("name", name))
            .await?;
        self.invalidate(folder.document_id, Some(folder_id)).await;
        info!("Renamed folder {folder_id} to {name}");
        Ok(folder)
    }

    /// Delete a folder and, server-side, its items. A folder that already
    /// vanished counts as deleted.
    pub async fn delete_folder(&self, document_id: DocumentId, folder_id: FolderId) -> Result<()> {
        let result = self
            .transport
            .send(ApiRequest::delete(format!("/folders/{folder_id}")))
            .await;
        match result {
            Ok(_) => info!("Deleted folder {folder_id}"),
            Err(e) if e.is_not_found() => debug!("Folder {folder_id} was already gone"),
            Err(e) => return Err(e.into()),
        }
        self.invalidate(document_id, Some(folder_id)).await;
        Ok(())
    }

    /// Soft-deleted folders of every document, most recent first.
    pub async fn list_recycled_folders(&self) -> Result<Vec<DeletedFolder>> {
        let response = self.transport.send(ApiRequest::get(RECYCLE_BIN)).await?;
        Ok(response.list_or_empty())
    }

    /// Bring a soft-deleted folder back with its items.
    ///
    /// Refs that were filed into another folder while this one sat in the
    /// recycle bin stay where they are and are taken out of the restored
    /// folder.
    pub async fn restore_folder(&self, folder_id: FolderId) -> Result<FolderRestore> {
        self.transport
            .send(
                ApiRequest::post(format!("/folders/{folder_id}/restore"))
                    .invalidating(format!("/folders/{folder_id}"))
                    .invalidating(RECYCLE_BIN),
            )
            .await?;
        let restored = self.get_folder_fresh(folder_id).await?;
        let document_id = restored.folder.document_id;
        self.invalidate(document_id, Some(folder_id)).await;

        let held_elsewhere: HashSet<ItemRef> = self
            .reconcile(document_id)
            .await?
            .iter()
            .filter(|contents| contents.folder.id != folder_id)
            .flat_map(|contents| contents.items.iter().map(|item| item.source.item_ref()))
            .collect();

        let mut dropped = Vec::new();
        let mut folder_deleted = false;
        for item in &restored.items {
            let item_ref = item.source.item_ref();
            if !held_elsewhere.contains(&item_ref) {
                continue;
            }
            let outcome = self.remove_item(document_id, folder_id, item).await?;
            folder_deleted |= outcome.folder_auto_deleted();
            debug!("{item_ref} is filed elsewhere; left out of restored folder {folder_id}");
            dropped.push(item_ref);
        }
        if !dropped.is_empty() {
            self.invalidate(document_id, Some(folder_id)).await;
        }

        info!("Restored folder {folder_id} in document {document_id}");
        Ok(FolderRestore {
            folder_id,
            dropped,
            folder_deleted,
        })
    }

    /// Permanently delete a folder that is already in the recycle bin.
    pub async fn purge_folder(&self, folder_id: FolderId) -> Result<()> {
        self.transport
            .send(
                ApiRequest::delete(format!("/folders/{folder_id}/purge"))
                    .invalidating(RECYCLE_BIN),
            )
            .await?;
        info!("Purged folder {folder_id}");
        Ok(())
    }

    /// Put `source` into `target`, or take it out of every folder when
    /// `target` is `None`.
    ///
    /// The ref first leaves every other folder, then joins the target, one
    /// call at a time. An "already exists" answer to the add is success.
    pub async fn assign_to_folder(
        &self,
        document_id: DocumentId,
        source: &ItemSource,
        target: Option<FolderId>,
    ) -> Result<Assignment> {
        let item_ref = source.item_ref();
        let folders = self.reconcile(document_id).await?;
        let holders: Vec<(FolderId, &FolderItem)> = folders
            .iter()
            .filter_map(|contents| {
                contents
                    .item_for(&item_ref)
                    .map(|item| (contents.folder.id, item))
            })
            .collect();

        let Some(target) = target else {
            let mut removed = Vec::with_capacity(holders.len());
            for (folder_id, item) in holders {
                removed.push(self.remove_item(document_id, folder_id, item).await?);
            }
            self.invalidate(document_id, None).await;
            info!("Unfiled {item_ref} in document {document_id}");
            return Ok(Assignment::Unfiled { removed });
        };

        let already_in_target = holders.iter().any(|(folder_id, _)| *folder_id == target);
        let mut moved_from = Vec::new();
        for (folder_id, item) in holders.into_iter().filter(|(id, _)| *id != target) {
            moved_from.push(self.remove_item(document_id, folder_id, item).await?);
        }

        if already_in_target {
            self.invalidate(document_id, Some(target)).await;
            if moved_from.is_empty() {
                return Ok(Assignment::Unchanged { folder_id: target });
            }
            return Ok(Assignment::Filed {
                folder_id: target,
                moved_from,
            });
        }

        let body = FolderItemRecord::new_item(target, source);
        let added = self
            .transport
            .send(
                ApiRequest::post("/folder-items")
                    .with_json(&body)?
                    .invalidating(format!("/folders/{target}"))
                    .invalidating(folders_path(document_id)),
            )
            .await;
        match added {
            Ok(_) => info!("Filed {item_ref} in folder {target}"),
            Err(e) if e.is_conflict() => debug!("{item_ref} was already in folder {target}"),
            Err(e) => {
                self.invalidate(document_id, Some(target)).await;
                return Err(e.into());
            }
        }
        self.invalidate(document_id, Some(target)).await;

        Ok(Assignment::Filed {
            folder_id: target,
            moved_from,
        })
    }

    /// Take `item_ref` out of `folder_id`.
    pub async fn remove_from_folder(
        &self,
        folder_id: FolderId,
        item_ref: &ItemRef,
    ) -> Result<RemoveOutcome> {
        let contents = match self.get_folder_fresh(folder_id).await {
            Ok(contents) => contents,
            Err(FolderError::Api(e)) if e.is_not_found() => return Ok(RemoveOutcome::NotPresent),
            Err(e) => return Err(e),
        };
        let document_id = contents.folder.document_id;
        let Some(item) = contents.item_for(item_ref) else {
            return Ok(RemoveOutcome::NotPresent);
        };

        let outcome = self.remove_item(document_id, folder_id, item).await?;
        self.invalidate(document_id, Some(folder_id)).await;
        Ok(outcome)
    }

    /// Delete one item and find out whether its folder survived.
    ///
    /// A server that reports `folderAlsoDeleted` is trusted. Otherwise the
    /// folder is re-read and, when empty, deleted here.
    async fn remove_item(
        &self,
        document_id: DocumentId,
        folder_id: FolderId,
        item: &FolderItem,
    ) -> Result<RemoveOutcome> {
        let deleted = self
            .transport
            .send(
                ApiRequest::delete(format!("/folder-items/{}", item.id))
                    .invalidating(format!("/folders/{folder_id}"))
                    .invalidating(folders_path(document_id)),
            )
            .await;
        let reported = match deleted {
            Ok(response) => response
                .json::<DeletedItem>()
                .unwrap_or_default()
                .folder_also_deleted,
            Err(e) if e.is_not_found() => {
                debug!("Folder item {} was already gone", item.id);
                self.transport
                    .invalidate(&[format!("/folders/{folder_id}"), folders_path(document_id)])
                    .await;
                None
            }
            Err(e) => return Err(e.into()),
        };
        self.forget_projection(document_id).await;

        let folder_deleted = match reported {
            Some(reported) => reported,
            None => self.delete_if_empty(document_id, folder_id).await?,
        };

        if folder_deleted {
            info!("Folder {folder_id} emptied and deleted");
            Ok(RemoveOutcome::RemovedAndFolderDeleted { folder_id })
        } else {
            Ok(RemoveOutcome::Removed { folder_id })
        }
    }

    /// Whether `folder_id` no longer exists after deleting it if empty.
    async fn delete_if_empty(&self, document_id: DocumentId, folder_id: FolderId) -> Result<bool> {
        match self.get_folder_fresh(folder_id).await {
            Ok(contents) if contents.items.is_empty() => {
                self.delete_folder(document_id, folder_id).await?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(FolderError::Api(e)) if e.is_not_found() => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Rebuild the ref → folder projection from live items.
    ///
    /// The map is stored for [`FolderService::folder_of`] only when no folder
    /// mutation for the document completed while it was being built.
    pub async fn load_folder_map(&self, document_id: DocumentId) -> Result<FolderMap> {
        let generation = self.projections.read().await.generation(document_id);
        let folders = self.reconcile(document_id).await?;

        let mut map = FolderMap::new();
        for contents in &folders {
            for item in &contents.items {
                let item_ref = item.source.item_ref();
                if !map.insert(item_ref.clone(), contents.folder.id) {
                    warn!(
                        "{item_ref} is filed in more than one folder; keeping {:?}",
                        map.get(&item_ref)
                    );
                }
            }
        }

        debug!(
            "Folder map for document {document_id}: {} refs in {} folders",
            map.len(),
            folders.len()
        );
        let mut projections = self.projections.write().await;
        if projections.generation(document_id) == generation {
            projections.maps.insert(document_id, map.clone());
        } else {
            debug!("Folders of document {document_id} changed during reconciliation; not storing");
        }
        Ok(map)
    }

    /// The folder holding `item_ref`, from the stored projection when one
    /// survives, otherwise from a fresh reconciliation.
    pub async fn folder_of(
        &self,
        document_id: DocumentId,
        item_ref: &ItemRef,
    ) -> Result<Option<FolderId>> {
        if let Some(map) = self.projections.read().await.maps.get(&document_id) {
            return Ok(map.get(item_ref));
        }
        Ok(self.load_folder_map(document_id).await?.get(item_ref))
    }

    /// Whether a projection is stored for the document.
    pub async fn has_projection(&self, document_id: DocumentId) -> bool {
        self.projections.read().await.maps.contains_key(&document_id)
    }

    /// Live folders with their items, read straight from the backend.
    async fn reconcile(&self, document_id: DocumentId) -> Result<Vec<FolderContents>> {
        let folders = self.list_folders_authoritative(document_id).await?;
        let reads = join_all(
            folders
                .iter()
                .map(|folder| self.get_folder_fresh(folder.id)),
        )
        .await;

        let mut live = Vec::with_capacity(folders.len());
        for (folder, read) in folders.iter().zip(reads) {
            match read {
                Ok(contents) => live.push(contents),
                Err(FolderError::Api(e)) if e.is_not_found() => {
                    debug!("Folder {} vanished during reconciliation", folder.id);
                }
                Err(e) => return Err(e),
            }
        }
        live.sort_by_key(|contents| contents.folder.id);
        Ok(live)
    }

    /// Drop cached folder reads and the projection of a document.
    pub(crate) async fn invalidate(&self, document_id: DocumentId, folder_id: Option<FolderId>) {
        let mut prefixes = vec![folders_path(document_id)];
        match folder_id {
            Some(folder_id) => prefixes.push(format!("/folders/{folder_id}")),
            None => prefixes.push("/folders".to_string()),
        }
        self.transport.invalidate(&prefixes).await;
        self.forget_projection(document_id).await;
    }

    async fn forget_projection(&self, document_id: DocumentId) {
        let mut projections = self.projections.write().await;
        projections.maps.remove(&document_id);
        *projections.generations.entry(document_id).or_default() += 1;
    }
}

fn folders_path(document_id: DocumentId) -> String {
    format!("/documents/{document_id}/folders")
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FolderError::Validation(
            "folder name must not be empty".to_string(),
        ));
    }
    Ok(name)
}
