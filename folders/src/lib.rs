//! # Folders
//!
//! Named containers of segments and chunks, kept consistent with the backend.
//!
//! A ref sits in at most one folder. Moving it removes it from every other
//! folder first, and a folder emptied by a removal is deleted. The folder map
//! (ref → folder) is a projection rebuilt from live items and dropped on
//! every mutation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Workspace                             │
//! │                                                                  │
//! │  SegmentStore      FolderService ◄── Migrator ◄── LocalStore     │
//! │       │                 │                          (chunks,      │
//! │       │          FolderMap projection               local        │
//! │       │                 │                           folders,     │
//! │       └──────► Transport (cache, dedupe, auth)      recycle bin) │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let workspace = Workspace::new(transport, Arc::new(LocalStore::open(path).await?));
//!
//! let chunk = workspace.duplicate_segment(7).await?;
//! let outcome = workspace.file_chunk(&chunk.id, Some(folder_id)).await?;
//! println!("{outcome}");
//! ```

pub mod error;
pub mod local;
pub mod migration;
pub mod model;
pub mod notes;
pub mod recycle;
pub mod service;
pub mod workspace;

pub use error::{FolderError, Result, StorageError};
pub use local::{EphemeralChunk, LocalExport, LocalFolder, LocalStore};
pub use migration::{ImportSummary, MigrationOutcome, MigrationState, Migrator};
pub use model::{
    Assignment, ChunkSnapshot, DeletedFolder, Folder, FolderContents, FolderId, FolderItem,
    FolderItemId, FolderMap, FolderRestore, ItemRef, ItemSource, RemoveOutcome,
};
pub use notes::{DocumentNote, NotePriority, SmartNote, SmartNoteDraft};
pub use recycle::{RETENTION_DAYS, RecycledChunk};
pub use service::FolderService;
pub use workspace::Workspace;
