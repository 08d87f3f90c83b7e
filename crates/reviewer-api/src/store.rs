//! In-memory record table keyed by collection and record id.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AppError;

/// A note as exchanged with clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub content: String,
    pub vault_id: String,
    /// Overwritten by the server on every write
    #[serde(default)]
    pub updated_at: i64,
}

impl Record {
    /// Same note, ignoring the server stamp
    fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.content == other.content
            && self.vault_id == other.vault_id
    }
}

#[derive(Debug, Default)]
pub struct RecordTable {
    collections: RwLock<HashMap<String, BTreeMap<String, Record>>>,
    last_stamp: AtomicI64,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record and return it with whether it was inserted.
    ///
    /// Re-sending an identical record is accepted and returns the stored
    /// copy, so a client retrying a create whose response it lost still
    /// succeeds.
    pub async fn create(
        &self,
        collection: &str,
        mut record: Record,
    ) -> Result<(Record, bool), AppError> {
        validate_id(&record.id)?;
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if let Some(existing) = records.get(&record.id) {
            if existing.same_content(&record) {
                return Ok((existing.clone(), false));
            }
            return Err(AppError::conflict(format!(
                "record '{}' already exists",
                record.id
            )));
        }

        record.updated_at = self.next_stamp();
        records.insert(record.id.clone(), record.clone());
        Ok((record, true))
    }

    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        mut record: Record,
    ) -> Result<Record, AppError> {
        if record.id != id {
            return Err(AppError::bad_request(format!(
                "body id '{}' does not match path id '{id}'",
                record.id
            )));
        }

        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| AppError::not_found(format!("record '{id}'")))?;

        record.updated_at = self.next_stamp();
        *slot = record.clone();
        Ok(record)
    }

    /// Remove a record; returns whether it existed
    pub async fn delete(&self, collection: &str, id: &str) -> bool {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|records| records.remove(id))
            .is_some()
    }

    /// Records modified strictly after `after_ms`, oldest first
    pub async fn list_modified_after(
        &self,
        collection: &str,
        after_ms: i64,
        limit: usize,
    ) -> Vec<Record> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Vec::new();
        };

        let mut modified = records
            .values()
            .filter(|record| record.updated_at > after_ms)
            .cloned()
            .collect::<Vec<_>>();
        modified.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        modified.truncate(limit);
        modified
    }

    pub async fn count(&self) -> usize {
        self.collections
            .read()
            .await
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    /// Wall clock in ms, bumped so every write gets a distinct, increasing stamp
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

fn validate_id(id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        Err(AppError::bad_request("record id must not be empty"))
    } else {
        Ok(())
    }
}
