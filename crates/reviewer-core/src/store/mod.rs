//! Offline store for documents, the mutation queue, and sync metadata.
//!
//! Records are grouped into [`Collection`]s and addressed by primary key.
//! Each record type declares a handful of secondary index entries that
//! [`LocalStore::get_all`] can filter on with an equality match.

mod migrations;
mod records;
mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::DocumentId;

pub use self::sqlite::LibSqlStore;

/// Named partitions of the offline store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Documents,
    PendingMutations,
    Metadata,
}

impl Collection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::PendingMutations => "pending_mutations",
            Self::Metadata => "metadata",
        }
    }
}

/// Secondary indexes maintained alongside records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// Owning vault of a document
    VaultId,
    /// `is_synced` flag of a document
    SyncStatus,
    /// Last-modified timestamp of a document
    UpdatedAt,
    /// Enqueue timestamp of a pending mutation
    EnqueuedAt,
    /// Remote collection a pending mutation targets
    Target,
    /// Document a pending mutation writes
    DocumentId,
}

impl Index {
    pub const fn name(self) -> &'static str {
        match self {
            Self::VaultId => "vault_id",
            Self::SyncStatus => "is_synced",
            Self::UpdatedAt => "updated_at",
            Self::EnqueuedAt => "enqueued_at",
            Self::Target => "target",
            Self::DocumentId => "document_id",
        }
    }

    pub const fn collection(self) -> Collection {
        match self {
            Self::VaultId | Self::SyncStatus | Self::UpdatedAt => Collection::Documents,
            Self::EnqueuedAt | Self::Target | Self::DocumentId => Collection::PendingMutations,
        }
    }
}

/// Encode a boolean the same way for index writes and lookups
pub(crate) const fn bool_key(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Equality filter on one secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFilter {
    pub index: Index,
    pub value: String,
}

impl IndexFilter {
    pub fn new(index: Index, value: impl Into<String>) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }

    /// Documents belonging to `vault_id`
    pub fn vault(vault_id: impl Into<String>) -> Self {
        Self::new(Index::VaultId, vault_id)
    }

    /// Documents whose `is_synced` flag equals `synced`
    pub fn sync_status(synced: bool) -> Self {
        Self::new(Index::SyncStatus, bool_key(synced))
    }

    /// Pending mutations aimed at remote collection `target`
    pub fn target(target: impl Into<String>) -> Self {
        Self::new(Index::Target, target)
    }

    /// Pending mutations that write document `id`
    pub fn document(id: DocumentId) -> Self {
        Self::new(Index::DocumentId, id.as_str())
    }
}

/// A type that can be persisted in the offline store
pub trait Record: Serialize + DeserializeOwned {
    /// Collection the record lives in
    const COLLECTION: Collection;

    /// Primary key
    fn key(&self) -> String;

    /// Secondary index entries for this record
    fn index_entries(&self) -> Vec<(Index, String)> {
        Vec::new()
    }
}

/// A record serialized for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredRecord {
    pub collection: Collection,
    pub key: String,
    pub body: String,
    pub indexes: Vec<(Index, String)>,
}

impl StoredRecord {
    pub fn encode<R: Record>(record: &R) -> Result<Self> {
        Ok(Self {
            collection: R::COLLECTION,
            key: record.key(),
            body: serde_json::to_string(record)?,
            indexes: record.index_entries(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BatchOp {
    Put(StoredRecord),
    Delete { collection: Collection, key: String },
}

/// Writes that commit together or not at all
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an upsert of `record`
    pub fn put<R: Record>(mut self, record: &R) -> Result<Self> {
        self.ops.push(BatchOp::Put(StoredRecord::encode(record)?));
        Ok(self)
    }

    /// Queue removal of the `R` stored under `key`
    #[must_use]
    pub fn delete<R: Record>(mut self, key: impl Into<String>) -> Self {
        self.ops.push(BatchOp::Delete {
            collection: R::COLLECTION,
            key: key.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Asynchronous key-value storage partitioned into collections.
///
/// Every call may suspend. Separate calls are not atomic with respect to
/// each other; use [`LocalStore::apply`] when several writes must land
/// together.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// Fetch the record stored under `key`
    async fn get<R: Record>(&self, key: &str) -> Result<Option<R>>;

    /// Fetch all records of a collection, optionally filtered on one index
    async fn get_all<R: Record>(&self, filter: Option<&IndexFilter>) -> Result<Vec<R>>;

    /// Insert or replace a record by primary key
    async fn put<R: Record>(&self, record: &R) -> Result<()>;

    /// Remove a record; missing keys are ignored
    async fn delete<R: Record>(&self, key: &str) -> Result<()>;

    /// Number of records in the collection
    async fn count<R: Record>(&self) -> Result<usize>;

    /// Remove every record in the collection
    async fn clear<R: Record>(&self) -> Result<()>;

    /// Commit a batch of writes atomically
    async fn apply(&self, batch: WriteBatch) -> Result<()>;
}

/// Reject filters that name an index of another collection
pub(crate) fn check_filter<R: Record>(filter: &IndexFilter) -> Result<()> {
    if filter.index.collection() == R::COLLECTION {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "index '{}' does not belong to collection '{}'",
            filter.index.name(),
            R::COLLECTION.as_str()
        )))
    }
}
