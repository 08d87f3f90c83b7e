use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use reviewer_core::config::ClientConfig;
use reviewer_core::network::NetworkStatus;
use reviewer_core::remote::{HttpRemote, RemoteApi, RemoteError, RemoteResult};
use reviewer_core::store::{LibSqlStore, LocalStore};
use reviewer_core::sync::{SyncEngine, SyncReport};
use reviewer_core::{Document, DocumentId};
use serde::Serialize;

use crate::error::CliError;

/// Vault used when neither `--vault` nor `REVIEWER_VAULT` is set
pub const DEFAULT_VAULT: &str = "default";

pub type CliEngine = SyncEngine<LibSqlStore, CliRemote>;

/// Resolved configuration shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub db_path: PathBuf,
    pub vault: String,
}

impl Context {
    pub fn new(
        config: ClientConfig,
        cli_db_path: Option<PathBuf>,
        cli_vault: Option<String>,
    ) -> Result<Self, CliError> {
        let db_path = resolve_db_path(cli_db_path, config.db_path.clone())?;
        let vault = cli_vault
            .and_then(|vault| normalize_content(&vault))
            .or_else(|| config.default_vault.clone())
            .unwrap_or_else(|| DEFAULT_VAULT.to_string());
        Ok(Self {
            config,
            db_path,
            vault,
        })
    }

    pub fn require_sync(&self) -> Result<(), CliError> {
        if self.config.is_sync_configured() {
            Ok(())
        } else {
            Err(CliError::SyncNotConfigured)
        }
    }
}

/// HTTP remote when `REVIEWER_API_URL` is set. Local-only commands work
/// without one; remote calls then fail with a configuration error.
#[derive(Debug)]
pub struct CliRemote(Option<HttpRemote>);

impl CliRemote {
    pub fn from_config(config: &ClientConfig) -> Result<Self, CliError> {
        let remote = config
            .api_url
            .as_ref()
            .map(|url| HttpRemote::new(url.as_str(), config.api_token.clone()))
            .transpose()?;
        Ok(Self(remote))
    }

    pub const fn http(&self) -> Option<&HttpRemote> {
        self.0.as_ref()
    }

    fn configured(&self) -> RemoteResult<&HttpRemote> {
        self.0.as_ref().ok_or_else(|| {
            RemoteError::InvalidConfiguration("REVIEWER_API_URL is not set".to_string())
        })
    }
}

impl RemoteApi for CliRemote {
    async fn create(&self, target: &str, document: &Document) -> RemoteResult<()> {
        self.configured()?.create(target, document).await
    }

    async fn update(&self, target: &str, document: &Document) -> RemoteResult<()> {
        self.configured()?.update(target, document).await
    }

    async fn delete(&self, target: &str, id: &DocumentId) -> RemoteResult<()> {
        self.configured()?.delete(target, id).await
    }

    async fn list_modified_after(
        &self,
        target: &str,
        after_ms: i64,
        limit: usize,
    ) -> RemoteResult<Vec<Document>> {
        self.configured()?
            .list_modified_after(target, after_ms, limit)
            .await
    }
}

/// Open the offline store and wrap it in an engine.
///
/// Commands that never sync pass a fixed status; it only shows up in
/// `status` output.
pub async fn open_engine(context: &Context, network: NetworkStatus) -> Result<CliEngine, CliError> {
    let store = LibSqlStore::open(&context.db_path).await?;
    let remote = CliRemote::from_config(&context.config)?;
    Ok(SyncEngine::new(
        Arc::new(store),
        remote,
        network,
        context.config.sync.clone(),
    ))
}

pub async fn open_local_engine(context: &Context) -> Result<CliEngine, CliError> {
    open_engine(
        context,
        NetworkStatus::fixed(context.config.is_sync_configured()),
    )
    .await
}

#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub vault_id: String,
    pub updated_at: i64,
    pub relative_time: String,
    pub is_synced: bool,
    pub pending_operation: Option<String>,
}

pub async fn resolve_document(query: &str, engine: &CliEngine) -> Result<Document, CliError> {
    if let Ok(id) = query.parse::<DocumentId>() {
        if let Some(document) = engine.get_document(&id).await? {
            return Ok(document);
        }
    }

    let needle = query.to_ascii_lowercase();
    let mut matching = engine
        .store()
        .get_all::<Document>(None)
        .await?
        .into_iter()
        .filter(|document| document.id.as_str().starts_with(&needle))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            matching.sort_by(|a, b| a.id.cmp(&b.id));
            let options = matching
                .iter()
                .take(3)
                .map(|document| short_id(&document.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &DocumentId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn format_document_lines(documents: &[Document]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    documents
        .iter()
        .map(|document| {
            let short_id = short_id(&document.id);
            let preview = document_preview(document, 40);
            let relative_time = format_relative_time(document.updated_at, now_ms);
            let marker = if document.is_synced { " " } else { "*" };

            format!("{marker} {short_id:<13}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn document_to_list_item(document: &Document) -> DocumentListItem {
    let now_ms = Utc::now().timestamp_millis();
    DocumentListItem {
        id: document.id.to_string(),
        title: document.title.clone(),
        preview: document_preview(document, 80),
        vault_id: document.vault_id.clone(),
        updated_at: document.updated_at,
        relative_time: format_relative_time(document.updated_at, now_ms),
        is_synced: document.is_synced,
        pending_operation: document
            .local_changes
            .map(|change| change.operation.to_string()),
    }
}

/// Title, falling back to the first content line, collapsed to one line
pub fn document_preview(document: &Document, max_chars: usize) -> String {
    let source = document.title_preview(usize::MAX);
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Pushed {} of {} queued change(s)",
        report.pushed, report.queued
    )];
    if report.retried > 0 {
        lines.push(format!("{} change(s) will be retried", report.retried));
    }
    if report.deferred > 0 {
        lines.push(format!("{} change(s) waiting for backoff", report.deferred));
    }
    if report.dropped > 0 {
        lines.push(format!("{} change(s) dropped after failing", report.dropped));
    }
    match (&report.pulled, &report.pull_error) {
        (Some(count), _) => lines.push(format!("Pulled {count} remote note(s)")),
        (None, Some(error)) => lines.push(format!("Pull failed: {error}")),
        (None, None) => {}
    }
    if let Some(error) = &report.queue_error {
        lines.push(format!("Local queue error: {error}"));
    }
    lines
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "never".to_string();
    }
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Title for a new note: explicit title, else the first content line
/// without markdown heading markers
pub fn derive_title(title: Option<String>, content: &str) -> String {
    title
        .and_then(|title| normalize_content(&title))
        .unwrap_or_else(|| {
            content
                .lines()
                .map(|line| line.trim_start_matches('#').trim())
                .find(|line| !line.is_empty())
                .unwrap_or_default()
                .chars()
                .take(120)
                .collect()
        })
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program).args(parts).arg(file_path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("reviewer-note-{}-{now}.md", std::process::id()))
}

/// `--db-path`, then `REVIEWER_DB_PATH`, then the platform data directory
pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    env_db_path: Option<PathBuf>,
) -> Result<PathBuf, CliError> {
    match cli_db_path.or(env_db_path) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("reviewer").join("reviewer.db"))
        .ok_or(CliError::DataDirUnavailable)
}
