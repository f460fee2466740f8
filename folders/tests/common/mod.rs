//! In-memory backend for the folder suites.
//!
//! Serves the folder, folder item, segment and migration routes from shared
//! state so tests can assert on what the server ends up holding.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use organizer_transport::{Credentials, MemoryCredentialStore, Transport, TransportConfig};
use serde_json::{Value, json};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const CREATED_AT: &str = "2025-01-10T09:00:00";

#[derive(Debug, Clone)]
struct FakeFolder {
    id: i64,
    document_id: i64,
    name: String,
}

#[derive(Debug, Clone)]
struct FakeItem {
    id: i64,
    folder_id: i64,
    segment_id: Option<i64>,
    chunk_id: Option<String>,
    body: Value,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    folders: BTreeMap<i64, FakeFolder>,
    items: BTreeMap<i64, FakeItem>,
    deleted_folders: BTreeMap<i64, (FakeFolder, Vec<FakeItem>)>,
    segments: BTreeMap<i64, Value>,
    reports_auto_delete: bool,
    fail_migrations: bool,
    folder_read_delay: Option<Duration>,
    smart_notes: Vec<Value>,
    document_notes: BTreeMap<i64, Value>,
    requests: Vec<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn folder_out(&self, folder: &FakeFolder) -> Value {
        let item_count = self
            .items
            .values()
            .filter(|item| item.folder_id == folder.id)
            .count();
        json!({
            "id": folder.id,
            "name": folder.name,
            "documentId": folder.document_id,
            "createdAt": CREATED_AT,
            "itemCount": item_count,
        })
    }

    fn item_out(item: &FakeItem) -> Value {
        json!({
            "id": item.id,
            "folderId": item.folder_id,
            "segmentId": item.segment_id,
            "chunkId": item.chunk_id,
            "chunkTitle": item.body.get("chunkTitle"),
            "chunkContent": item.body.get("chunkContent"),
            "chunkMode": item.body.get("chunkMode"),
            "chunkIsManual": item.body.get("chunkIsManual"),
            "chunkOrderIndex": item.body.get("chunkOrderIndex"),
            "createdAt": CREATED_AT,
        })
    }

    fn insert_item(&mut self, folder_id: i64, segment_id: Option<i64>, chunk_id: Option<String>, body: Value) -> i64 {
        let id = self.next_id();
        self.items.insert(
            id,
            FakeItem {
                id,
                folder_id,
                segment_id,
                chunk_id,
                body,
            },
        );
        id
    }
}

/// Stateful stand-in for the backend.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    /// A backend that answers item deletions with `{ok}` only.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that deletes emptied folders and says so.
    pub fn reporting_auto_delete() -> Self {
        let backend = Self::new();
        backend.state().reports_auto_delete = true;
        backend
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub async fn start(&self) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(self.clone())
            .mount(&server)
            .await;
        server
    }

    pub fn fail_migrations(&self, fail: bool) {
        self.state().fail_migrations = fail;
    }

    /// Answer `GET /folders/{id}` late, with the state seen on arrival.
    pub fn delay_folder_reads(&self, delay: Duration) {
        self.state().folder_read_delay = Some(delay);
    }

    pub fn add_segment(&self, id: i64, document_id: i64, title: &str) {
        self.state().segments.insert(
            id,
            json!({
                "id": id,
                "documentId": document_id,
                "mode": "qa",
                "title": title,
                "content": format!("content of {title}"),
                "start": 0,
                "end": 10,
                "isManual": false,
                "orderIndex": id,
                "createdAt": CREATED_AT,
            }),
        );
    }

    pub fn add_folder(&self, document_id: i64, name: &str) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        state.folders.insert(
            id,
            FakeFolder {
                id,
                document_id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn file_segment(&self, folder_id: i64, segment_id: i64) -> i64 {
        self.state()
            .insert_item(folder_id, Some(segment_id), None, json!({}))
    }

    pub fn folder_names(&self, document_id: i64) -> Vec<String> {
        self.state()
            .folders
            .values()
            .filter(|folder| folder.document_id == document_id)
            .map(|folder| folder.name.clone())
            .collect()
    }

    pub fn has_folder(&self, folder_id: i64) -> bool {
        self.state().folders.contains_key(&folder_id)
    }

    /// Rendered refs filed in `folder_id`.
    pub fn refs_in(&self, folder_id: i64) -> Vec<String> {
        self.state()
            .items
            .values()
            .filter(|item| item.folder_id == folder_id)
            .map(|item| match (&item.segment_id, &item.chunk_id) {
                (Some(segment_id), _) => segment_id.to_string(),
                (None, Some(chunk_id)) => format!("chunk:{chunk_id}"),
                (None, None) => String::new(),
            })
            .collect()
    }

    /// Notes imported for `document_id`.
    pub fn smart_notes(&self, document_id: i64) -> Vec<Value> {
        self.state()
            .smart_notes
            .iter()
            .filter(|note| note["documentId"].as_i64() == Some(document_id))
            .cloned()
            .collect()
    }

    pub fn document_note(&self, document_id: i64) -> Option<Value> {
        self.state().document_notes.get(&document_id).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.state().items.len()
    }

    /// Requests seen so far, as `"METHOD /path"`.
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    pub fn count(&self, request: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|seen| seen.as_str() == request)
            .count()
    }
}

fn detail(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "detail": message }))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

impl Respond for FakeBackend {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state();
        let method = request.method.as_str().to_string();
        let path = request.url.path().to_string();
        state.requests.push(format!("{method} {path}"));

        let query: BTreeMap<String, String> = request
            .url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["documents", document_id, "folders"]) => {
                let document_id: i64 = document_id.parse().unwrap_or_default();
                let folders: Vec<Value> = state
                    .folders
                    .values()
                    .filter(|folder| folder.document_id == document_id)
                    .map(|folder| state.folder_out(folder))
                    .collect();
                ok(Value::Array(folders))
            }
            ("GET", ["folders", "recycle-bin"]) => {
                let deleted: Vec<Value> = state
                    .deleted_folders
                    .values()
                    .map(|(folder, _)| {
                        json!({
                            "id": folder.id,
                            "name": folder.name,
                            "documentId": folder.document_id,
                            "documentTitle": "Lecture notes",
                            "deletedAt": CREATED_AT,
                        })
                    })
                    .collect();
                ok(Value::Array(deleted))
            }
            ("POST", ["folders", folder_id, "restore"]) => {
                let folder_id: i64 = folder_id.parse().unwrap_or_default();
                if state.folders.contains_key(&folder_id) {
                    return ok(json!({ "ok": true, "message": "Folder not deleted", "deletedAt": null }));
                }
                let Some((folder, items)) = state.deleted_folders.remove(&folder_id) else {
                    return detail(404, "Folder not found");
                };
                state.folders.insert(folder_id, folder);
                for item in items {
                    state.items.insert(item.id, item);
                }
                ok(json!({ "ok": true, "deletedAt": null }))
            }
            ("DELETE", ["folders", folder_id, "purge"]) => {
                let folder_id: i64 = folder_id.parse().unwrap_or_default();
                if state.folders.contains_key(&folder_id) {
                    return detail(400, "Folder must be deleted before purging");
                }
                if state.deleted_folders.remove(&folder_id).is_none() {
                    return detail(404, "Folder not found");
                }
                ok(json!({ "ok": true, "permanentlyDeleted": true }))
            }
            ("GET", ["folders", folder_id]) => {
                let folder_id: i64 = folder_id.parse().unwrap_or_default();
                let Some(folder) = state.folders.get(&folder_id) else {
                    return detail(404, "Folder not found");
                };
                let mut out = state.folder_out(folder);
                out["items"] = state
                    .items
                    .values()
                    .filter(|item| item.folder_id == folder_id)
                    .map(State::item_out)
                    .collect();
                match state.folder_read_delay {
                    Some(delay) => ok(out).set_delay(delay),
                    None => ok(out),
                }
            }
            ("POST", ["folders"]) => {
                let id = state.next_id();
                let folder = FakeFolder {
                    id,
                    document_id: body["documentId"].as_i64().unwrap_or_default(),
                    name: body["name"].as_str().unwrap_or_default().to_string(),
                };
                let out = state.folder_out(&folder);
                state.folders.insert(id, folder);
                ok(out)
            }
            ("PATCH", ["folders", folder_id]) => {
                let folder_id: i64 = folder_id.parse().unwrap_or_default();
                let Some(name) = query.get("name").cloned() else {
                    return detail(422, "name is required");
                };
                let Some(folder) = state.folders.get_mut(&folder_id) else {
                    return detail(404, "Folder not found");
                };
                folder.name = name;
                let folder = folder.clone();
                ok(state.folder_out(&folder))
            }
            ("DELETE", ["folders", folder_id]) => {
                let folder_id: i64 = folder_id.parse().unwrap_or_default();
                let Some(folder) = state.folders.remove(&folder_id) else {
                    return detail(404, "Folder not found");
                };
                let items: Vec<FakeItem> = state
                    .items
                    .values()
                    .filter(|item| item.folder_id == folder_id)
                    .cloned()
                    .collect();
                state.items.retain(|_, item| item.folder_id != folder_id);
                state.deleted_folders.insert(folder_id, (folder, items));
                ok(json!({ "ok": true }))
            }
            ("POST", ["folder-items"]) => {
                let folder_id = body["folderId"].as_i64().unwrap_or_default();
                if !state.folders.contains_key(&folder_id) {
                    return detail(404, "Folder not found");
                }
                let segment_id = body["segmentId"].as_i64();
                let chunk_id = body["chunkId"].as_str().map(str::to_string);
                if segment_id.is_some() == chunk_id.is_some() {
                    return detail(400, "Exactly one of segmentId or chunkId is required");
                }
                let duplicate = state.items.values().any(|item| {
                    item.folder_id == folder_id
                        && item.segment_id == segment_id
                        && item.chunk_id == chunk_id
                });
                if duplicate {
                    return detail(409, "Item already in folder");
                }
                let id = state.insert_item(folder_id, segment_id, chunk_id, body);
                ok(State::item_out(&state.items[&id]))
            }
            ("DELETE", ["folder-items", item_id]) => {
                let item_id: i64 = item_id.parse().unwrap_or_default();
                let Some(item) = state.items.remove(&item_id) else {
                    return detail(404, "Folder item not found");
                };
                if !state.reports_auto_delete {
                    return ok(json!({ "ok": true }));
                }
                let emptied = !state
                    .items
                    .values()
                    .any(|other| other.folder_id == item.folder_id);
                if emptied {
                    state.folders.remove(&item.folder_id);
                }
                ok(json!({
                    "ok": true,
                    "removed": true,
                    "folderAlsoDeleted": emptied,
                    "folderId": item.folder_id,
                }))
            }
            ("GET", ["segments", segment_id]) => {
                let segment_id: i64 = segment_id.parse().unwrap_or_default();
                match state.segments.get(&segment_id) {
                    Some(segment) => ok(segment.clone()),
                    None => detail(404, "Segment not found"),
                }
            }
            ("DELETE", ["segments", segment_id]) => {
                let segment_id: i64 = segment_id.parse().unwrap_or_default();
                if state.segments.remove(&segment_id).is_none() {
                    return detail(404, "Segment not found");
                }
                state
                    .items
                    .retain(|_, item| item.segment_id != Some(segment_id));
                ok(json!({ "ok": true }))
            }
            ("POST", ["documents", document_id, "migrate-localstorage"]) => {
                if state.fail_migrations {
                    return detail(500, "Migration failed");
                }
                let document_id: i64 = document_id.parse().unwrap_or_default();
                migrate(&mut state, document_id, &body)
            }
            _ => detail(404, "Not Found"),
        }
    }
}

/// Import local folders, reusing same-named folders.
fn migrate(state: &mut State, document_id: i64, body: &Value) -> ResponseTemplate {
    let mut folder_ids: BTreeMap<String, i64> = BTreeMap::new();
    let mut folders = 0;
    let mut folder_items = 0;

    for folder in body["folders"].as_array().into_iter().flatten() {
        let old_id = folder["id"].as_str().unwrap_or_default().to_string();
        let name = folder["name"].as_str().unwrap_or_default().trim().to_string();
        if name.is_empty() {
            continue;
        }
        let existing = state
            .folders
            .values()
            .find(|f| f.document_id == document_id && f.name == name)
            .map(|f| f.id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = state.next_id();
                state.folders.insert(
                    id,
                    FakeFolder {
                        id,
                        document_id,
                        name,
                    },
                );
                folders += 1;
                id
            }
        };
        folder_ids.insert(old_id, id);
    }

    let chunks: BTreeMap<String, Value> = body["duplicatedChunks"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|chunk| Some((chunk["id"].as_str()?.to_string(), chunk.clone())))
        .collect();
    for folder in body["folders"].as_array().into_iter().flatten() {
        let Some(new_id) = folder["id"].as_str().and_then(|id| folder_ids.get(id)).copied() else {
            continue;
        };
        for chunk_id in folder["contents"].as_array().into_iter().flatten() {
            let Some(chunk) = chunk_id.as_str().and_then(|id| chunks.get(id)) else {
                continue;
            };
            let item = json!({
                "chunkTitle": chunk["title"],
                "chunkContent": chunk["content"],
                "chunkMode": chunk["mode"],
                "chunkIsManual": chunk["isManual"],
                "chunkOrderIndex": chunk["orderIndex"],
            });
            let chunk_id = chunk["id"].as_str().map(str::to_string);
            state.insert_item(new_id, None, chunk_id, item);
            folder_items += 1;
        }
    }
    for (segment_id, old_folder_id) in body["folderMap"].as_object().into_iter().flatten() {
        let (Ok(segment_id), Some(new_id)) = (
            segment_id.parse::<i64>(),
            old_folder_id.as_str().and_then(|id| folder_ids.get(id)).copied(),
        ) else {
            continue;
        };
        state.insert_item(new_id, Some(segment_id), None, json!({}));
        folder_items += 1;
    }

    let mut smart_notes = 0;
    for note in body["smartNotes"].as_array().into_iter().flatten() {
        let mut note = note.clone();
        note["documentId"] = json!(document_id);
        state.smart_notes.push(note);
        smart_notes += 1;
    }
    let document_note = body["documentNote"].is_object();
    if document_note {
        state
            .document_notes
            .insert(document_id, body["documentNote"].clone());
    }

    ok(json!({
        "ok": true,
        "imported": {
            "folders": folders,
            "folderItems": folder_items,
            "smartNotes": smart_notes,
            "documentNote": document_note,
        },
        "message": "Migration completed",
    }))
}

pub fn transport(server: &MockServer) -> Arc<Transport> {
    let credentials = MemoryCredentialStore::with_credentials(Credentials::new("token", "refresh"));
    Arc::new(Transport::new(
        TransportConfig::new(server.uri()),
        Arc::new(credentials),
    ))
}
