//! # organizer
//!
//! Command-line access to a document's segments, folders and local chunks.
//!
//! ```bash
//! organizer segments list 12 --mode qa
//! organizer folders assign 12 7 --folder 3
//! organizer chunks duplicate 7
//! organizer migrate 12
//! ```
//!
//! Settings come from `organizer.toml` in the user config directory, or the
//! file named by `--config`. Logs go to stderr, filtered by `RUST_LOG`.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use organizer_folders::{ItemRef, NotePriority};
use organizer_segments::SegmentMode;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "organizer", version, about = "Segment and folder organizer")]
struct Cli {
    /// Path to organizer.toml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Work with a document's segments.
    #[command(subcommand)]
    Segments(SegmentsCommand),

    /// Work with durable folders.
    #[command(subcommand)]
    Folders(FoldersCommand),

    /// Work with local chunks.
    #[command(subcommand)]
    Chunks(ChunksCommand),

    /// Work with local notes.
    #[command(subcommand)]
    Notes(NotesCommand),

    /// Upload local folders and notes of a document once.
    Migrate { document: i64 },

    /// Manage stored credentials.
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Show how a character range splits a document's text.
    Split {
        document: i64,
        start: usize,
        end: usize,
    },
}

#[derive(Subcommand)]
enum SegmentsCommand {
    /// List segments.
    List {
        document: i64,
        #[arg(long)]
        mode: Option<SegmentMode>,
    },

    /// Run automatic segmentation.
    Run {
        document: i64,
        #[arg(long)]
        mode: SegmentMode,
    },

    /// Create a manual segment from a character range.
    Create {
        document: i64,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        #[arg(long, default_value = "qa")]
        mode: SegmentMode,
        #[arg(long)]
        title: Option<String>,
    },

    /// Change a segment's title, bounds or content.
    Patch {
        segment: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<usize>,
        #[arg(long)]
        end: Option<usize>,
        #[arg(long)]
        content: Option<String>,
    },

    /// Delete a segment.
    Delete {
        segment: i64,
        #[arg(long)]
        yes: bool,
    },

    /// Delete a document's segments.
    Clear {
        document: i64,
        #[arg(long)]
        mode: Option<SegmentMode>,
        #[arg(long)]
        include_manual: bool,
        #[arg(long)]
        yes: bool,
    },

    /// Report segments whose offsets no longer match the text.
    Audit { document: i64 },

    /// List deleted segments awaiting purge.
    Recycled,

    /// Bring a deleted segment back.
    Restore { segment: i64 },

    /// Permanently delete a segment from the recycle bin.
    Purge {
        segment: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum FoldersCommand {
    /// List a document's folders.
    List { document: i64 },

    /// Show a folder and its items.
    Show { folder: i64 },

    /// Create a folder.
    Create { document: i64, name: String },

    /// Rename a folder.
    Rename { folder: i64, name: String },

    /// Delete a folder and its items.
    Delete {
        document: i64,
        folder: i64,
        #[arg(long)]
        yes: bool,
    },

    /// File a ref (`7` or `chunk:<id>`) into a folder, or unfile it.
    Assign {
        document: i64,
        item: ItemRef,
        #[arg(long)]
        folder: Option<i64>,
    },

    /// Take a ref out of a folder, deleting the folder if it empties.
    Remove {
        folder: i64,
        item: ItemRef,
        #[arg(long)]
        yes: bool,
    },

    /// Print which folder holds each ref.
    Map { document: i64 },

    /// List deleted folders awaiting purge.
    Recycled,

    /// Bring a deleted folder back with its items.
    Restore { folder: i64 },

    /// Permanently delete a folder from the recycle bin.
    Purge {
        folder: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ChunksCommand {
    /// Copy a segment into a local chunk.
    Duplicate { segment: i64 },

    /// List local chunks.
    List {
        document: i64,
        #[arg(long)]
        recycled: bool,
    },

    /// File a chunk into a folder, or unfile it.
    File {
        chunk: String,
        #[arg(long)]
        folder: Option<i64>,
    },

    /// Unfile a chunk and move it to the recycle bin.
    Discard {
        document: i64,
        chunk: String,
        #[arg(long)]
        yes: bool,
    },

    /// Bring a chunk back from the recycle bin.
    Restore { chunk: String },

    /// Drop recycled chunks past retention.
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum NotesCommand {
    /// Add a note to a document.
    Add {
        document: i64,
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: NotePriority,
        #[arg(long)]
        segment: Option<i64>,
    },

    /// List a document's notes.
    List { document: i64 },

    /// Delete a note.
    Delete { note: String },

    /// Replace the document note. Empty text clears it.
    SetDocument {
        document: i64,
        text: String,
        #[arg(long)]
        html: Option<String>,
    },
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Store an access/refresh token pair.
    SetTokens { access: String, refresh: String },

    /// Forget stored credentials.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    commands::run(cli.command, &config).await
}
