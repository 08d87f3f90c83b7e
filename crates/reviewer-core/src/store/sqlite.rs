//! libSQL-backed offline store

use std::path::{Path, PathBuf};

use libsql::{params, Builder, Connection, Database};
use tokio::sync::Mutex;

use super::{
    check_filter, migrations, BatchOp, IndexFilter, LocalStore, Record, StoredRecord, WriteBatch,
};
use crate::error::{Error, Result};

/// Offline store in a local `SQLite` file (or in memory)
pub struct LibSqlStore {
    _db: Database,
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl LibSqlStore {
    /// Open a store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;
        Self::init(db, conn, Some(path)).await
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;
        Self::init(db, conn, None).await
    }

    async fn init(db: Database, conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        configure(&conn).await?;
        migrations::run(&conn).await?;
        if let Some(path) = &path {
            tracing::debug!("Opened offline store at {}", path.display());
        }
        Ok(Self {
            _db: db,
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Filesystem location, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Configure `SQLite` for the offline store's access pattern
async fn configure(conn: &Connection) -> Result<()> {
    // journal_mode returns a row and is ignored for in-memory databases
    conn.query("PRAGMA journal_mode = WAL;", ()).await.ok();
    conn.execute("PRAGMA synchronous = NORMAL;", ()).await.ok();
    conn.execute("PRAGMA busy_timeout = 5000;", ()).await.ok();
    Ok(())
}

async fn write_op(conn: &Connection, op: &BatchOp) -> Result<()> {
    match op {
        BatchOp::Put(record) => write_record(conn, record).await,
        BatchOp::Delete { collection, key } => {
            conn.execute(
                "DELETE FROM records WHERE collection = ?1 AND key = ?2",
                params![collection.as_str(), key.as_str()],
            )
            .await?;
            Ok(())
        }
    }
}

async fn write_record(conn: &Connection, record: &StoredRecord) -> Result<()> {
    let collection = record.collection.as_str();
    conn.execute(
        "INSERT INTO records (collection, key, body) VALUES (?1, ?2, ?3)
         ON CONFLICT(collection, key) DO UPDATE SET body = excluded.body",
        params![collection, record.key.as_str(), record.body.as_str()],
    )
    .await?;
    conn.execute(
        "DELETE FROM record_indexes WHERE collection = ?1 AND key = ?2",
        params![collection, record.key.as_str()],
    )
    .await?;
    for (index, value) in &record.indexes {
        conn.execute(
            "INSERT INTO record_indexes (collection, key, name, value) VALUES (?1, ?2, ?3, ?4)",
            params![collection, record.key.as_str(), index.name(), value.as_str()],
        )
        .await?;
    }
    Ok(())
}

/// Apply `ops` inside one transaction, rolling back on the first failure
async fn commit_ops(conn: &Connection, ops: &[BatchOp]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for op in ops {
        if let Err(e) = write_op(conn, op).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

async fn collect_bodies<R: Record>(mut rows: libsql::Rows) -> Result<Vec<R>> {
    let mut records = Vec::new();
    while let Some(row) = rows.next().await? {
        let body: String = row.get(0)?;
        records.push(serde_json::from_str(&body)?);
    }
    Ok(records)
}

impl LocalStore for LibSqlStore {
    async fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE collection = ?1 AND key = ?2",
                params![R::COLLECTION.as_str(), key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn get_all<R: Record>(&self, filter: Option<&IndexFilter>) -> Result<Vec<R>> {
        let conn = self.conn.lock().await;
        let rows = if let Some(filter) = filter {
            check_filter::<R>(filter)?;
            conn.query(
                "SELECT r.body
                 FROM records r
                 JOIN record_indexes i ON i.collection = r.collection AND i.key = r.key
                 WHERE r.collection = ?1 AND i.name = ?2 AND i.value = ?3",
                params![
                    R::COLLECTION.as_str(),
                    filter.index.name(),
                    filter.value.as_str()
                ],
            )
            .await?
        } else {
            conn.query(
                "SELECT body FROM records WHERE collection = ?1",
                params![R::COLLECTION.as_str()],
            )
            .await?
        };

        collect_bodies(rows).await
    }

    async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let stored = StoredRecord::encode(record)?;
        let conn = self.conn.lock().await;
        commit_ops(&conn, &[BatchOp::Put(stored)]).await
    }

    async fn delete<R: Record>(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        write_op(
            &conn,
            &BatchOp::Delete {
                collection: R::COLLECTION,
                key: key.to_string(),
            },
        )
        .await
    }

    async fn count<R: Record>(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![R::COLLECTION.as_str()],
            )
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid row count {count}")))
    }

    async fn clear<R: Record>(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![R::COLLECTION.as_str()],
        )
        .await?;
        tracing::debug!(collection = R::COLLECTION.as_str(), "Cleared collection");
        Ok(())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();
        let conn = self.conn.lock().await;
        commit_ops(&conn, &ops).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::models::{Document, Operation, PendingMutation, SyncCheckpoint};

    async fn setup() -> LibSqlStore {
        LibSqlStore::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_missing_key_returns_none() {
        let store = setup().await;
        let missing = store.get::<Document>("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_and_get_roundtrip() {
        let store = setup().await;
        let doc = Document::new("vault", "Title", "# Heading\nbody");

        store.put(&doc).await.unwrap();
        let fetched = store.get::<Document>(&doc.id.as_str()).await.unwrap();
        assert_eq!(fetched, Some(doc));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_is_idempotent() {
        let store = setup().await;
        let doc = Document::new("vault", "Title", "body");

        store.put(&doc).await.unwrap();
        store.put(&doc).await.unwrap();

        assert_eq!(store.count::<Document>().await.unwrap(), 1);
        let all = store.get_all::<Document>(None).await.unwrap();
        assert_eq!(all, vec![doc.clone()]);
        let in_vault = store
            .get_all::<Document>(Some(&IndexFilter::vault("vault")))
            .await
            .unwrap();
        assert_eq!(in_vault, vec![doc]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_refreshes_index_entries() {
        let store = setup().await;
        let mut doc = Document::new("vault", "Title", "body");
        store.put(&doc).await.unwrap();

        doc.is_synced = true;
        store.put(&doc).await.unwrap();

        let unsynced = store
            .get_all::<Document>(Some(&IndexFilter::sync_status(false)))
            .await
            .unwrap();
        assert!(unsynced.is_empty());
        let synced = store
            .get_all::<Document>(Some(&IndexFilter::sync_status(true)))
            .await
            .unwrap();
        assert_eq!(synced.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_all_filters_by_vault() {
        let store = setup().await;
        store.put(&Document::new("a", "1", "")).await.unwrap();
        store.put(&Document::new("a", "2", "")).await.unwrap();
        store.put(&Document::new("b", "3", "")).await.unwrap();

        let docs = store
            .get_all::<Document>(Some(&IndexFilter::vault("a")))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|doc| doc.vault_id == "a"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_all_finds_mutations_by_document() {
        let store = setup().await;
        let doc = Document::new("a", "1", "");
        let other = Document::new("a", "2", "");
        let first = PendingMutation::new(Operation::Create, "notes", doc.clone(), 1);
        let second = PendingMutation::new(Operation::Update, "notes", doc.clone(), 2);
        store.put(&first).await.unwrap();
        store.put(&second).await.unwrap();
        store
            .put(&PendingMutation::new(Operation::Create, "notes", other, 3))
            .await
            .unwrap();

        let mut queued = store
            .get_all::<PendingMutation>(Some(&IndexFilter::document(doc.id)))
            .await
            .unwrap();
        queued.sort_by(PendingMutation::drain_order);
        assert_eq!(queued, vec![first, second.clone()]);

        store.delete::<PendingMutation>(&second.id.as_str()).await.unwrap();
        let queued = store
            .get_all::<PendingMutation>(Some(&IndexFilter::document(doc.id)))
            .await
            .unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_all_rejects_foreign_index() {
        let store = setup().await;
        let err = store
            .get_all::<PendingMutation>(Some(&IndexFilter::vault("a")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_is_noop_for_missing_key() {
        let store = setup().await;
        let doc = Document::new("vault", "t", "c");
        store.put(&doc).await.unwrap();

        store.delete::<Document>("missing").await.unwrap();
        assert_eq!(store.count::<Document>().await.unwrap(), 1);

        store.delete::<Document>(&doc.id.as_str()).await.unwrap();
        assert_eq!(store.count::<Document>().await.unwrap(), 0);
        let by_vault = store
            .get_all::<Document>(Some(&IndexFilter::vault("vault")))
            .await
            .unwrap();
        assert!(by_vault.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn collections_are_isolated() {
        let store = setup().await;
        let doc = Document::new("vault", "t", "c");
        let mutation = PendingMutation::new(Operation::Create, "notes", doc.clone(), 1);
        store.put(&doc).await.unwrap();
        store.put(&mutation).await.unwrap();
        store.put(&SyncCheckpoint::new(5)).await.unwrap();

        assert_eq!(store.count::<Document>().await.unwrap(), 1);
        assert_eq!(store.count::<PendingMutation>().await.unwrap(), 1);

        store.clear::<PendingMutation>().await.unwrap();
        assert_eq!(store.count::<PendingMutation>().await.unwrap(), 0);
        assert_eq!(store.count::<Document>().await.unwrap(), 1);
        assert_eq!(
            store
                .get::<SyncCheckpoint>(SyncCheckpoint::KEY)
                .await
                .unwrap(),
            Some(SyncCheckpoint::new(5))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_commits_all_writes() {
        let store = setup().await;
        let doc = Document::new("vault", "t", "c");
        let mutation = PendingMutation::new(Operation::Create, "notes", doc.clone(), 1);

        let batch = WriteBatch::new()
            .put(&doc)
            .unwrap()
            .put(&mutation)
            .unwrap();
        assert_eq!(batch.len(), 2);
        store.apply(batch).await.unwrap();

        assert_eq!(store.count::<Document>().await.unwrap(), 1);
        assert_eq!(store.count::<PendingMutation>().await.unwrap(), 1);

        let batch = WriteBatch::new()
            .delete::<Document>(doc.id.as_str())
            .delete::<PendingMutation>(mutation.id.as_str());
        store.apply(batch).await.unwrap();
        assert_eq!(store.count::<Document>().await.unwrap(), 0);
        assert_eq!(store.count::<PendingMutation>().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_rolls_back_on_failure() {
        let store = setup().await;
        let doc = Document::new("vault", "t", "c");

        {
            let conn = store.conn.lock().await;
            conn.execute(
                "CREATE TRIGGER reject_mutations BEFORE INSERT ON records
                 WHEN NEW.collection = 'pending_mutations'
                 BEGIN SELECT RAISE(ABORT, 'queue unavailable'); END",
                (),
            )
            .await
            .unwrap();
        }

        let mutation = PendingMutation::new(Operation::Create, "notes", doc.clone(), 1);
        let batch = WriteBatch::new()
            .put(&doc)
            .unwrap()
            .put(&mutation)
            .unwrap();
        assert!(store.apply(batch).await.is_err());

        assert_eq!(store.count::<Document>().await.unwrap(), 0);
        assert_eq!(store.count::<PendingMutation>().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_store_persists_across_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("offline.db");
        let doc = Document::new("vault", "Persisted", "body");

        {
            let store = LibSqlStore::open(&path).await.unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            store.put(&doc).await.unwrap();
        }

        let reopened = LibSqlStore::open(&path).await.unwrap();
        let fetched = reopened
            .get::<Document>(&doc.id.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.title, "Persisted");
    }
}
