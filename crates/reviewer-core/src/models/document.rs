//! Document model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a document, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new unique document ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of write a pending mutation carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker for a local edit that the remote has not confirmed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalChange {
    pub operation: Operation,
    /// When the edit was made (Unix ms)
    pub timestamp: i64,
}

/// A note held in the offline store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,
    /// Note title
    pub title: String,
    /// Markdown content
    pub content: String,
    /// Vault (owning collection) the note belongs to
    pub vault_id: String,
    /// Last modification timestamp (Unix ms)
    pub updated_at: i64,
    /// Whether the remote copy matches this one
    pub is_synced: bool,
    /// Present while a local edit is unconfirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_changes: Option<LocalChange>,
}

impl Document {
    /// Create a new, not yet synced document
    #[must_use]
    pub fn new(
        vault_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            content: content.into(),
            vault_id: vault_id.into(),
            updated_at: chrono::Utc::now().timestamp_millis(),
            is_synced: false,
            local_changes: None,
        }
    }

    /// Replace title and/or content, bumping `updated_at`
    pub fn edit(&mut self, title: Option<String>, content: Option<String>) {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = content {
            self.content = content;
        }
        self.updated_at = chrono::Utc::now().timestamp_millis().max(self.updated_at);
    }

    /// Copy of this document flagged as an unconfirmed local edit
    #[must_use]
    pub fn with_local_change(mut self, operation: Operation, timestamp: i64) -> Self {
        self.is_synced = false;
        self.local_changes = Some(LocalChange {
            operation,
            timestamp,
        });
        self
    }

    /// Copy of this document flagged as matching the remote
    #[must_use]
    pub fn into_synced(mut self) -> Self {
        self.is_synced = true;
        self.local_changes = None;
        self
    }

    /// Title, or the first content line when the title is blank, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let title = self.title.trim();
        let source = if title.is_empty() {
            self.content.lines().next().unwrap_or("").trim()
        } else {
            title
        };
        source.chars().take(max_len).collect()
    }

    /// Check if note content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}
