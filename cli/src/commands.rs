//! Command handlers.

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use organizer_folders::{ItemRef, ItemSource, LocalStore, SmartNoteDraft, Workspace};
use organizer_offsets::split_by_range;
use organizer_segments::{ManualSegment, SegmentPatch, audit_offsets};
use organizer_transport::{CredentialStore, Credentials, FileCredentialStore, Transport};

use crate::config::CliConfig;
use crate::{AuthCommand, ChunksCommand, Command, FoldersCommand, NotesCommand, SegmentsCommand};

pub async fn run(command: Command, config: &CliConfig) -> Result<()> {
    let credentials = Arc::new(FileCredentialStore::open(config.credentials_path()).await?);

    if let Command::Auth(command) = command {
        return auth(command, credentials.as_ref()).await;
    }

    let transport = Arc::new(Transport::new(config.transport.clone(), credentials));
    let local = Arc::new(LocalStore::open(config.local_store_path()).await?);
    let workspace = Workspace::new(transport, local);

    match command {
        Command::Segments(command) => segments(command, &workspace).await,
        Command::Folders(command) => folders(command, &workspace).await,
        Command::Chunks(command) => chunks(command, &workspace).await,
        Command::Notes(command) => notes(command, workspace.local()).await,
        Command::Migrate { document } => {
            println!("{}", workspace.migrate(document).await?);
            Ok(())
        }
        Command::Split {
            document,
            start,
            end,
        } => {
            let document = workspace.documents().get_document(document).await?;
            let split = split_by_range(&document.text, start, end);
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "before": split.before,
                "mid": split.mid,
                "after": split.after,
            }))?);
            Ok(())
        }
        Command::Auth(_) => Ok(()),
    }
}

fn confirm(yes: bool, action: &str) -> Result<()> {
    if !yes {
        bail!("refusing to {action} without --yes");
    }
    Ok(())
}

async fn auth(command: AuthCommand, store: &dyn CredentialStore) -> Result<()> {
    match command {
        AuthCommand::SetTokens { access, refresh } => {
            store.save(&Credentials::new(access, refresh)).await?;
            println!("Credentials saved");
        }
        AuthCommand::Clear => {
            store.clear().await?;
            println!("Credentials cleared");
        }
    }
    Ok(())
}

async fn segments(command: SegmentsCommand, workspace: &Workspace) -> Result<()> {
    let store = workspace.segments();
    match command {
        SegmentsCommand::List { document, mode } => {
            let listing = store.list_segments(document, mode).await?;
            for segment in &listing.items {
                let manual = if segment.is_manual { " (manual)" } else { "" };
                println!(
                    "{:>6}  {:<10} [{}, {})  {}{manual}",
                    segment.id, segment.mode, segment.start, segment.end, segment.title
                );
            }
            match listing.meta.last_run {
                Some(last_run) => println!("{} segment(s), last run {last_run}", listing.meta.count),
                None => println!("{} segment(s)", listing.meta.count),
            }
        }
        SegmentsCommand::Run { document, mode } => {
            let document = workspace.documents().get_document(document).await?;
            let run = store.run_segmentation(&document, mode).await?;
            println!("Created {} {} segment(s)", run.count, run.mode);
        }
        SegmentsCommand::Create {
            document,
            start,
            end,
            mode,
            title,
        } => {
            let document = workspace.documents().get_document(document).await?;
            let mut segment = ManualSegment::new(mode, start, end);
            if let Some(title) = title {
                segment = segment.with_title(title);
            }
            let created = store.create_manual_segment_in(&document, segment).await?;
            println!("Created segment {} ({})", created.id, created.title);
        }
        SegmentsCommand::Patch {
            segment,
            title,
            start,
            end,
            content,
        } => {
            let patch = SegmentPatch {
                title,
                start,
                end,
                content,
            };
            let updated = store.patch_segment(segment, patch).await?;
            println!("Updated segment {}", updated.id);
        }
        SegmentsCommand::Delete { segment, yes } => {
            confirm(yes, "delete a segment")?;
            workspace.delete_segment(segment).await?;
            println!("Deleted segment {segment}");
        }
        SegmentsCommand::Clear {
            document,
            mode,
            include_manual,
            yes,
        } => {
            confirm(yes, "clear segments")?;
            println!("{}", store.delete_by_mode(document, mode, include_manual).await?);
        }
        SegmentsCommand::Audit { document } => {
            let document = workspace.documents().get_document(document).await?;
            let listing = store.list_segments(document.id, None).await?;
            let issues = audit_offsets(&document, &listing.items);
            if issues.is_empty() {
                println!("All {} segment(s) match the text", listing.items.len());
            }
            for issue in issues {
                println!("{issue}");
            }
        }
        SegmentsCommand::Recycled => {
            for segment in store.list_recycled_segments().await? {
                println!(
                    "{:>6}  {:<10} {}  (document {}, deleted {})",
                    segment.id, segment.mode, segment.title, segment.document_id, segment.deleted_at
                );
            }
        }
        SegmentsCommand::Restore { segment } => {
            let restored = store.restore_segment(segment).await?;
            println!("Restored segment {} ({})", restored.id, restored.title);
        }
        SegmentsCommand::Purge { segment, yes } => {
            confirm(yes, "purge a segment")?;
            store.purge_segment(segment).await?;
            println!("Purged segment {segment}");
        }
    }
    Ok(())
}

async fn folders(command: FoldersCommand, workspace: &Workspace) -> Result<()> {
    let service = workspace.folders();
    match command {
        FoldersCommand::List { document } => {
            for folder in service.list_folders(document).await? {
                println!("{:>6}  {}  ({} item(s))", folder.id, folder.name, folder.item_count);
            }
        }
        FoldersCommand::Show { folder } => {
            let contents = service.get_folder(folder).await?;
            println!("{} {}", contents.folder.id, contents.folder.name);
            for item in &contents.items {
                match &item.source {
                    ItemSource::Segment(segment_id) => println!("  segment {segment_id}"),
                    ItemSource::Chunk { id, snapshot } => println!(
                        "  chunk {id}  {}",
                        snapshot.title.as_deref().unwrap_or_default()
                    ),
                }
            }
        }
        FoldersCommand::Create { document, name } => {
            let folder = service.create_folder(document, &name).await?;
            println!("Created folder {} ({})", folder.id, folder.name);
        }
        FoldersCommand::Rename { folder, name } => {
            let folder = service.rename_folder(folder, &name).await?;
            println!("Renamed folder {} to {}", folder.id, folder.name);
        }
        FoldersCommand::Delete {
            document,
            folder,
            yes,
        } => {
            confirm(yes, "delete a folder")?;
            service.delete_folder(document, folder).await?;
            println!("Deleted folder {folder}");
        }
        FoldersCommand::Assign {
            document,
            item,
            folder,
        } => {
            let source = match &item {
                ItemRef::Segment(segment_id) => ItemSource::Segment(*segment_id),
                ItemRef::Chunk(chunk_id) => match workspace.local().chunk(chunk_id).await {
                    Some(chunk) => chunk.source(),
                    None => bail!("no local chunk {chunk_id}"),
                },
            };
            println!("{}", service.assign_to_folder(document, &source, folder).await?);
        }
        FoldersCommand::Remove { folder, item, yes } => {
            confirm(yes, "remove from a folder that may be deleted when emptied")?;
            println!("{}", service.remove_from_folder(folder, &item).await?);
        }
        FoldersCommand::Map { document } => {
            for (item_ref, folder_id) in service.load_folder_map(document).await?.iter() {
                println!("{item_ref}\t{folder_id}");
            }
        }
        FoldersCommand::Recycled => {
            for folder in service.list_recycled_folders().await? {
                println!(
                    "{:>6}  {}  (document {}, deleted {})",
                    folder.id, folder.name, folder.document_id, folder.deleted_at
                );
            }
        }
        FoldersCommand::Restore { folder } => {
            println!("{}", service.restore_folder(folder).await?);
        }
        FoldersCommand::Purge { folder, yes } => {
            confirm(yes, "purge a folder")?;
            service.purge_folder(folder).await?;
            println!("Purged folder {folder}");
        }
    }
    Ok(())
}

async fn chunks(command: ChunksCommand, workspace: &Workspace) -> Result<()> {
    let local = workspace.local();
    match command {
        ChunksCommand::Duplicate { segment } => {
            let chunk = workspace.duplicate_segment(segment).await?;
            println!("Created chunk {} ({})", chunk.id, chunk.title);
        }
        ChunksCommand::List {
            document,
            recycled: false,
        } => {
            for chunk in local.chunks(document).await {
                println!("{}  {}  (from segment {})", chunk.id, chunk.title, chunk.original_id);
            }
        }
        ChunksCommand::List {
            document,
            recycled: true,
        } => {
            let now = Utc::now();
            for entry in local.recycled(document).await {
                println!(
                    "{}  {}  ({} day(s) left)",
                    entry.chunk.id,
                    entry.chunk.title,
                    entry.days_left(now, local.retention())
                );
            }
        }
        ChunksCommand::File { chunk, folder } => {
            println!("{}", workspace.file_chunk(&chunk, folder).await?);
        }
        ChunksCommand::Discard {
            document,
            chunk,
            yes,
        } => {
            confirm(yes, "discard a chunk")?;
            let recycled = workspace.discard_chunk(document, &chunk).await?;
            println!("Moved {} to the recycle bin", recycled.chunk.title);
        }
        ChunksCommand::Restore { chunk } => {
            let chunk = workspace.restore_chunk(&chunk).await?;
            println!("Restored {}", chunk.title);
        }
        ChunksCommand::Purge { yes } => {
            confirm(yes, "purge the recycle bin")?;
            println!("Purged {} chunk(s)", workspace.purge_recycled().await?);
        }
    }
    Ok(())
}

async fn notes(command: NotesCommand, local: &LocalStore) -> Result<()> {
    match command {
        NotesCommand::Add {
            document,
            content,
            tags,
            category,
            priority,
            segment,
        } => {
            let mut draft = SmartNoteDraft::new(content).with_priority(priority);
            draft.tags = tags;
            if let Some(category) = category {
                draft = draft.with_category(category);
            }
            if let Some(segment) = segment {
                draft = draft.for_segment(segment);
            }
            let note = local.add_smart_note(document, draft).await?;
            println!("Added note {}", note.id);
        }
        NotesCommand::List { document } => {
            for note in local.smart_notes(document).await {
                println!(
                    "{}  [{}/{}]  {}",
                    note.id, note.category, note.priority, note.content
                );
            }
            if let Some(note) = local.document_note(document).await {
                println!("Document note: {}", note.text);
            }
        }
        NotesCommand::Delete { note } => {
            if !local.delete_smart_note(&note).await? {
                bail!("no note {note}");
            }
            println!("Deleted note {note}");
        }
        NotesCommand::SetDocument {
            document,
            text,
            html,
        } => {
            let html = html.unwrap_or_else(|| text.clone());
            match local.set_document_note(document, &html, &text).await? {
                Some(_) => println!("Document note saved"),
                None => println!("Document note cleared"),
            }
        }
    }
    Ok(())
}
