use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "reviewer")]
#[command(about = "Review notes offline and sync them when the records service is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Vault to file new notes under and to list
    #[arg(long, global = true, value_name = "VAULT")]
    pub vault: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title (defaults to the first content line)
        #[arg(short, long)]
        title: Option<String>,
        /// Note content; read from stdin or an editor when omitted
        content: Vec<String>,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the title
        #[arg(short, long)]
        title: Option<String>,
        /// Replace the content instead of opening an editor
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Print a single note
    Show {
        /// Note ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List notes of the vault, most recent first
    List {
        /// Only notes with changes the remote has not confirmed (any vault)
        #[arg(long)]
        unsynced: bool,
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queue and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync cycle: push queued changes, then pull remote ones
    Sync {
        /// Output the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the foreground until interrupted
    Watch {
        /// Seconds between cycles (overrides REVIEWER_SYNC_INTERVAL_SECS)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Delete all offline notes, queued changes and sync metadata
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
