mod common;

use std::time::Duration;

use common::{FakeBackend, transport};
use organizer_folders::{
    Assignment, ChunkSnapshot, FolderError, FolderService, ItemRef, ItemSource, RemoveOutcome,
};
use organizer_segments::SegmentMode;
use organizer_transport::{ApiError, ApiRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOC: i64 = 1;

async fn notes_scenario(backend: FakeBackend) {
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));

    let folder = service.create_folder(DOC, "Notes").await.unwrap();
    let filed = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(folder.id))
        .await
        .unwrap();
    assert_eq!(
        filed,
        Assignment::Filed {
            folder_id: folder.id,
            moved_from: vec![],
        }
    );

    let map = service.load_folder_map(DOC).await.unwrap();
    assert_eq!(map.get_key("7"), Some(folder.id));

    let outcome = service
        .remove_from_folder(folder.id, &ItemRef::Segment(7))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RemoveOutcome::RemovedAndFolderDeleted {
            folder_id: folder.id
        }
    );
    assert!(outcome.folder_auto_deleted());

    let map = service.load_folder_map(DOC).await.unwrap();
    assert_eq!(map.get_key("7"), None);
    assert!(!map.contains_folder(folder.id));
    assert!(service.list_folders(DOC).await.unwrap().is_empty());
    assert!(!backend.has_folder(folder.id));
}

#[tokio::test]
async fn test_emptied_folder_is_reported_deleted() {
    notes_scenario(FakeBackend::reporting_auto_delete()).await;
}

#[tokio::test]
async fn test_emptied_folder_is_deleted_when_server_is_silent() {
    let backend = FakeBackend::new();
    notes_scenario(backend.clone()).await;
    assert_eq!(backend.count("DELETE /folders/1"), 1);
}

#[tokio::test]
async fn test_moving_a_ref_leaves_the_old_folder() {
    let backend = FakeBackend::reporting_auto_delete();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let first = backend.add_folder(DOC, "First");
    let second = backend.add_folder(DOC, "Second");
    backend.file_segment(first, 3);

    service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(first))
        .await
        .unwrap();
    let moved = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(second))
        .await
        .unwrap();

    assert_eq!(
        moved,
        Assignment::Filed {
            folder_id: second,
            moved_from: vec![RemoveOutcome::Removed { folder_id: first }],
        }
    );
    assert_eq!(moved.to_string(), format!("Filed in folder {second} (moved from {first})"));
    assert_eq!(backend.refs_in(first), vec!["3".to_string()]);
    assert_eq!(backend.refs_in(second), vec!["7".to_string()]);
    assert_eq!(
        service.folder_of(DOC, &ItemRef::Segment(7)).await.unwrap(),
        Some(second)
    );
}

#[tokio::test]
async fn test_retried_assignment_files_once() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");

    service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(folder))
        .await
        .unwrap();
    let retried = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(folder))
        .await
        .unwrap();

    assert_eq!(retried, Assignment::Unchanged { folder_id: folder });
    assert_eq!(backend.refs_in(folder), vec!["7".to_string()]);
    assert_eq!(backend.count("POST /folder-items"), 1);
}

#[tokio::test]
async fn test_concurrent_assignments_file_once() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");

    let source = ItemSource::Segment(7);
    let (a, b) = tokio::join!(
        service.assign_to_folder(DOC, &source, Some(folder)),
        service.assign_to_folder(DOC, &source, Some(folder)),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(backend.refs_in(folder), vec!["7".to_string()]);
}

#[tokio::test]
async fn test_conflict_on_add_counts_as_filed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/1/folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/folder-items"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"detail": "Item already in folder"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = FolderService::new(transport(&server));
    let filed = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(4))
        .await
        .unwrap();

    assert_eq!(
        filed,
        Assignment::Filed {
            folder_id: 4,
            moved_from: vec![],
        }
    );
}

#[tokio::test]
async fn test_failed_add_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/1/folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/folder-items"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Folder not found"})))
        .mount(&server)
        .await;

    let service = FolderService::new(transport(&server));
    let err = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(4))
        .await
        .unwrap_err();

    assert_eq!(err.api().and_then(ApiError::status), Some(404));
}

#[tokio::test]
async fn test_unfiling_removes_from_every_folder() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");
    backend.file_segment(folder, 7);
    backend.file_segment(folder, 8);

    let unfiled = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), None)
        .await
        .unwrap();

    assert_eq!(
        unfiled,
        Assignment::Unfiled {
            removed: vec![RemoveOutcome::Removed { folder_id: folder }],
        }
    );
    assert!(!unfiled.folder_auto_deleted());
    assert_eq!(backend.refs_in(folder), vec!["8".to_string()]);

    let nothing = service
        .assign_to_folder(DOC, &ItemSource::Segment(7), None)
        .await
        .unwrap();
    assert_eq!(nothing.to_string(), "Not in any folder");
}

#[tokio::test]
async fn test_removing_absent_ref_is_not_present() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");
    backend.file_segment(folder, 8);

    let absent = service
        .remove_from_folder(folder, &ItemRef::Segment(7))
        .await
        .unwrap();
    let missing_folder = service
        .remove_from_folder(999, &ItemRef::Segment(7))
        .await
        .unwrap();

    assert_eq!(absent, RemoveOutcome::NotPresent);
    assert_eq!(missing_folder, RemoveOutcome::NotPresent);
    assert!(backend.has_folder(folder));
}

#[tokio::test]
async fn test_chunk_and_segment_refs_stay_apart() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let segments = backend.add_folder(DOC, "Segments");
    let chunks = backend.add_folder(DOC, "Chunks");

    let chunk = ItemSource::Chunk {
        id: "7".to_string(),
        snapshot: ChunkSnapshot {
            title: Some("Intro (1)".to_string()),
            content: Some("text".to_string()),
            mode: Some(SegmentMode::Qa),
            is_manual: false,
            order_index: 0,
        },
    };
    service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(segments))
        .await
        .unwrap();
    service
        .assign_to_folder(DOC, &chunk, Some(chunks))
        .await
        .unwrap();

    let map = service.load_folder_map(DOC).await.unwrap();
    assert_eq!(map.get_key("7"), Some(segments));
    assert_eq!(map.get_key("chunk:7"), Some(chunks));

    let contents = service.get_folder(chunks).await.unwrap();
    assert_eq!(contents.items.len(), 1);
    assert_eq!(contents.items[0].source, chunk);
}

#[tokio::test]
async fn test_folder_lifecycle() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));

    let err = service.create_folder(DOC, "   ").await.unwrap_err();
    assert!(matches!(err, FolderError::Validation(_)));
    assert!(backend.requests().is_empty());

    let folder = service.create_folder(DOC, "  Exam prep ").await.unwrap();
    assert_eq!(folder.name, "Exam prep");
    assert_eq!(service.list_folders(DOC).await.unwrap().len(), 1);

    let renamed = service.rename_folder(folder.id, "Finals").await.unwrap();
    assert_eq!(renamed.name, "Finals");
    assert_eq!(service.list_folders(DOC).await.unwrap()[0].name, "Finals");

    service.delete_folder(DOC, folder.id).await.unwrap();
    service.delete_folder(DOC, folder.id).await.unwrap();
    assert!(service.list_folders(DOC).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mutations_refresh_cached_reads() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");

    assert_eq!(service.get_folder(folder).await.unwrap().items.len(), 0);
    assert_eq!(service.list_folders(DOC).await.unwrap()[0].item_count, 0);

    service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(folder))
        .await
        .unwrap();

    assert_eq!(service.get_folder(folder).await.unwrap().items.len(), 1);
    assert_eq!(service.list_folders(DOC).await.unwrap()[0].item_count, 1);
    assert!(!service.has_projection(DOC).await);
}

#[tokio::test]
async fn test_projection_is_reused_until_a_mutation() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");
    backend.file_segment(folder, 7);

    assert_eq!(
        service.folder_of(DOC, &ItemRef::Segment(7)).await.unwrap(),
        Some(folder)
    );
    assert!(service.has_projection(DOC).await);
    let reads = backend.count(&format!("GET /folders/{folder}"));
    service.folder_of(DOC, &ItemRef::Segment(7)).await.unwrap();
    assert_eq!(backend.count(&format!("GET /folders/{folder}")), reads);

    service.create_folder(DOC, "Other").await.unwrap();
    assert!(!service.has_projection(DOC).await);
}

#[tokio::test]
async fn test_map_built_across_a_mutation_is_not_stored() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let folder = backend.add_folder(DOC, "Exam");
    backend.file_segment(folder, 7);
    backend.delay_folder_reads(Duration::from_millis(400));

    let (loaded, deleted) = tokio::join!(service.load_folder_map(DOC), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.delete_folder(DOC, folder).await
    });
    deleted.unwrap();

    assert_eq!(loaded.unwrap().get_key("7"), Some(folder));
    assert!(!service.has_projection(DOC).await);
    assert_eq!(service.folder_of(DOC, &ItemRef::Segment(7)).await.unwrap(), None);
}

#[tokio::test]
async fn test_restored_folder_keeps_refs_filed_elsewhere_out() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let exam = backend.add_folder(DOC, "Exam");
    backend.file_segment(exam, 7);
    backend.file_segment(exam, 8);

    service.delete_folder(DOC, exam).await.unwrap();
    let recycled = service.list_recycled_folders().await.unwrap();
    assert_eq!(recycled.len(), 1);
    assert_eq!((recycled[0].id, recycled[0].name.as_str()), (exam, "Exam"));

    let other = service.create_folder(DOC, "Other").await.unwrap();
    service
        .assign_to_folder(DOC, &ItemSource::Segment(7), Some(other.id))
        .await
        .unwrap();

    let restore = service.restore_folder(exam).await.unwrap();
    assert_eq!(restore.dropped, vec![ItemRef::Segment(7)]);
    assert!(!restore.folder_deleted);

    let map = service.load_folder_map(DOC).await.unwrap();
    assert_eq!(map.get_key("7"), Some(other.id));
    assert_eq!(map.get_key("8"), Some(exam));
    assert!(service.list_recycled_folders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_only_recycled_folders_can_be_purged() {
    let backend = FakeBackend::new();
    let server = backend.start().await;
    let service = FolderService::new(transport(&server));
    let live = backend.add_folder(DOC, "Live");
    let gone = backend.add_folder(DOC, "Gone");

    service.delete_folder(DOC, gone).await.unwrap();
    service.purge_folder(gone).await.unwrap();
    assert!(service.list_recycled_folders().await.unwrap().is_empty());

    let err = service.restore_folder(gone).await.unwrap_err();
    assert_eq!(err.api().and_then(ApiError::status), Some(404));

    let err = service.purge_folder(live).await.unwrap_err();
    assert_eq!(err.api().and_then(ApiError::status), Some(400));
    assert!(backend.has_folder(live));
}

#[tokio::test]
async fn test_malformed_item_fails_the_folder_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/folders/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "name": "Exam", "documentId": 1, "itemCount": 1,
            "items": [{"id": 1, "folderId": 3, "segmentId": 7, "chunkId": "c-1"}]
        })))
        .mount(&server)
        .await;

    let transport = transport(&server);
    let service = FolderService::new(transport.clone());
    let err = service.get_folder(3).await.unwrap_err();

    assert!(matches!(err.api(), Some(ApiError::Decode(_))));
    assert!(transport.send(ApiRequest::get("/folders/3")).await.is_ok());
}
