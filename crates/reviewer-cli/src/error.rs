use std::io;

use reviewer_core::config::ConfigError;
use reviewer_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] reviewer_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Could not resolve a data directory; pass --db-path or set REVIEWER_DB_PATH")]
    DataDirUnavailable,
    #[error("Refusing to clear offline data without --yes")]
    ClearNotConfirmed,
    #[error("Sync is not configured. Set REVIEWER_API_URL to the records service base URL.")]
    SyncNotConfigured,
}
