//! Drains the mutation queue against the remote and pulls newer records.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::retry::{DropReason, RetryDecision, RetryPolicy};
use super::state::SyncState;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentId, Operation, PendingMutation, SyncCheckpoint, SyncStatus};
use crate::network::NetworkStatus;
use crate::remote::{RemoteApi, RemoteError, RemoteResult};
use crate::store::{IndexFilter, LocalStore, WriteBatch};
use crate::util::now_millis;

/// Why a sync trigger did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another cycle is in flight
    AlreadySyncing,
    /// The network port reports offline, or the engine is paused
    Offline,
}

/// Counters for one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Mutations in the queue when the drain started
    pub queued: usize,
    /// Mutations the remote accepted
    pub pushed: usize,
    /// Failed mutations kept for a later cycle
    pub retried: usize,
    /// Mutations skipped because their backoff has not elapsed
    pub deferred: usize,
    /// Mutations removed without reaching the remote
    pub dropped: usize,
    /// Remote records applied locally; `None` if the pull failed
    pub pulled: Option<usize>,
    /// Why the pull failed, if it did
    pub pull_error: Option<String>,
    /// Last local store failure seen while draining
    pub queue_error: Option<String>,
}

impl SyncReport {
    /// Whether every step of the cycle succeeded
    pub const fn is_clean(&self) -> bool {
        self.retried == 0
            && self.dropped == 0
            && self.pull_error.is_none()
            && self.queue_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped { reason: SkipReason },
}

impl SyncOutcome {
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}

/// Offline-first sync engine.
///
/// Owns the store handle, the remote client and the network port. At most
/// one cycle runs at a time: [`SyncEngine::sync`] checks and flips the state
/// without suspending in between, and concurrent triggers are skipped.
pub struct SyncEngine<S, R> {
    store: Arc<S>,
    remote: R,
    network: NetworkStatus,
    settings: SyncSettings,
    retry: RetryPolicy,
    state: Mutex<SyncState>,
}

impl<S: LocalStore, R: RemoteApi> SyncEngine<S, R> {
    pub fn new(store: Arc<S>, remote: R, network: NetworkStatus, settings: SyncSettings) -> Self {
        let retry = RetryPolicy::from(&settings);
        Self {
            store,
            remote,
            network,
            settings,
            retry,
            state: Mutex::new(SyncState::Idle),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Write a document locally and queue the matching remote mutation.
    ///
    /// The document (or its removal) and the queued mutation are committed
    /// in one batch.
    pub async fn save_document(
        &self,
        document: Document,
        operation: Operation,
    ) -> Result<PendingMutation> {
        if document.vault_id.trim().is_empty() {
            return Err(Error::InvalidInput("vault_id must not be empty".to_string()));
        }

        let now = now_millis();
        let marked = document.with_local_change(operation, now);
        let mutation = PendingMutation::new(
            operation,
            self.settings.remote_collection.as_str(),
            marked.clone(),
            now,
        );

        let batch = match operation {
            Operation::Create | Operation::Update => WriteBatch::new().put(&marked)?,
            Operation::Delete => WriteBatch::new().delete::<Document>(marked.id.as_str()),
        };
        self.store.apply(batch.put(&mutation)?).await?;

        tracing::debug!(
            document_id = %mutation.document_id(),
            operation = %operation,
            "Queued local change"
        );
        Ok(mutation)
    }

    pub async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        self.store.get::<Document>(&id.as_str()).await
    }

    /// Documents of a vault, most recently updated first
    pub async fn vault_documents(&self, vault_id: &str) -> Result<Vec<Document>> {
        let mut documents = self
            .store
            .get_all::<Document>(Some(&IndexFilter::vault(vault_id)))
            .await?;
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }

    pub async fn unsynced_documents(&self) -> Result<Vec<Document>> {
        let mut documents = self
            .store
            .get_all::<Document>(Some(&IndexFilter::sync_status(false)))
            .await?;
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }

    /// Queued mutations in drain order
    pub async fn pending_mutations(&self) -> Result<Vec<PendingMutation>> {
        let mut queue = self.store.get_all::<PendingMutation>(None).await?;
        queue.sort_by(PendingMutation::drain_order);
        Ok(queue)
    }

    /// Stored pull checkpoint; zero when nothing was ever pulled
    pub async fn checkpoint(&self) -> Result<SyncCheckpoint> {
        Ok(self
            .store
            .get::<SyncCheckpoint>(SyncCheckpoint::KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        let pending_mutations = self.store.count::<PendingMutation>().await?;
        let unsynced_documents = self
            .store
            .get_all::<Document>(Some(&IndexFilter::sync_status(false)))
            .await?
            .len();
        let last_sync = self.checkpoint().await?.last_pull_at;

        Ok(SyncStatus {
            pending_mutations,
            unsynced_documents,
            last_sync,
            is_online: self.network.is_online(),
            state: self.state(),
        })
    }

    /// Remove all documents, queued mutations and sync metadata
    pub async fn clear_offline_data(&self) -> Result<()> {
        self.store.clear::<Document>().await?;
        self.store.clear::<PendingMutation>().await?;
        self.store.clear::<SyncCheckpoint>().await?;
        tracing::info!("Cleared offline data");
        Ok(())
    }

    /// React to a connectivity change reported by the host.
    ///
    /// Coming online starts a cycle and returns its outcome.
    pub async fn network_changed(&self, online: bool) -> Option<SyncOutcome> {
        {
            let mut state = self.state.lock();
            *state = if online {
                state.came_online()
            } else {
                state.went_offline()
            };
        }

        if online {
            tracing::info!("Network online, syncing");
            Some(self.sync().await)
        } else {
            tracing::info!("Network offline, sync paused");
            None
        }
    }

    /// Run one cycle: drain the queue, then pull remote changes.
    pub async fn sync(&self) -> SyncOutcome {
        let _guard = match self.try_begin() {
            Ok(guard) => guard,
            Err(reason) => {
                tracing::debug!(reason = ?reason, "Sync skipped");
                return SyncOutcome::Skipped { reason };
            }
        };

        let mut report = SyncReport::default();
        self.drain(&mut report).await;

        match self.pull().await {
            Ok(count) => {
                tracing::info!(count, "Downloaded latest data");
                report.pulled = Some(count);
            }
            Err(error) => {
                tracing::warn!("Failed to download latest data: {}", error);
                report.pull_error = Some(error.to_string());
            }
        }

        SyncOutcome::Completed(report)
    }

    /// Sync periodically and on reconnect until `shutdown` flips to true.
    ///
    /// A cycle that is already running finishes before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut network = self.network.clone();
        let mut network_open = true;

        tracing::info!(interval = ?self.settings.interval, "Sync loop started");
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    log_outcome(&self.sync().await);
                }
                change = network.changed(), if network_open => match change {
                    Some(online) => {
                        if let Some(outcome) = self.network_changed(online).await {
                            log_outcome(&outcome);
                        }
                    }
                    None => network_open = false,
                },
            }
        }
        tracing::info!("Sync loop stopped");
    }

    fn try_begin(&self) -> std::result::Result<CycleGuard<'_>, SkipReason> {
        let online = self.network.is_online();
        let mut state = self.state.lock();

        if state.is_syncing() {
            if !online {
                *state = state.went_offline();
            }
            return Err(SkipReason::AlreadySyncing);
        }
        if !online {
            *state = state.went_offline();
            return Err(SkipReason::Offline);
        }

        *state = state.begin().ok_or(SkipReason::Offline)?;
        Ok(CycleGuard {
            state: &self.state,
            network: &self.network,
        })
    }

    async fn drain(&self, report: &mut SyncReport) {
        let queue = match self.pending_mutations().await {
            Ok(queue) => queue,
            Err(error) => {
                tracing::error!("Failed to read sync queue: {}", error);
                report.queue_error = Some(error.to_string());
                return;
            }
        };

        report.queued = queue.len();
        tracing::info!(queue_size = queue.len(), "Starting sync");

        let now = now_millis();
        for mutation in queue {
            if mutation.is_deferred(now) {
                report.deferred += 1;
                continue;
            }

            let outcome = match self.push(&mutation).await {
                Ok(()) => self.confirm(&mutation).await.map(|()| {
                    tracing::debug!(
                        mutation_id = %mutation.id,
                        operation = %mutation.operation,
                        "Synced item"
                    );
                    report.pushed += 1;
                }),
                Err(error) => self.record_failure(mutation, &error, report).await,
            };

            if let Err(error) = outcome {
                tracing::error!("Failed to update sync queue: {}", error);
                report.queue_error = Some(error.to_string());
            }
        }
    }

    async fn push(&self, mutation: &PendingMutation) -> RemoteResult<()> {
        let target = mutation.target.as_str();
        match mutation.operation {
            Operation::Create => self.remote.create(target, &mutation.payload).await,
            Operation::Update => self.remote.update(target, &mutation.payload).await,
            Operation::Delete => self.remote.delete(target, &mutation.payload.id).await,
        }
    }

    /// Dequeue an accepted mutation and mark its document synced
    async fn confirm(&self, mutation: &PendingMutation) -> Result<()> {
        let mut batch = WriteBatch::new().delete::<PendingMutation>(mutation.id.as_str());

        if mutation.operation != Operation::Delete {
            let document_id = mutation.document_id();
            // A later write to the same document keeps it unsynced until that
            // write drains too.
            let superseded = self
                .store
                .get_all::<PendingMutation>(Some(&IndexFilter::document(document_id)))
                .await?
                .iter()
                .any(|other| other.id != mutation.id);
            if !superseded {
                if let Some(document) = self.store.get::<Document>(&document_id.as_str()).await? {
                    batch = batch.put(&document.into_synced())?;
                }
            }
        }

        self.store.apply(batch).await
    }

    async fn record_failure(
        &self,
        mutation: PendingMutation,
        error: &RemoteError,
        report: &mut SyncReport,
    ) -> Result<()> {
        let failures = mutation.retries.saturating_add(1);
        match self
            .retry
            .decide(failures, error.is_permanent(), now_millis())
        {
            RetryDecision::Retry { next_attempt_at } => {
                tracing::warn!(
                    mutation_id = %mutation.id,
                    retries = failures,
                    "Failed to sync item: {}",
                    error
                );
                report.retried += 1;
                let updated = PendingMutation {
                    retries: failures,
                    next_attempt_at,
                    last_error: Some(error.to_string()),
                    ..mutation
                };
                self.store.put(&updated).await
            }
            RetryDecision::Drop(reason) => {
                match reason {
                    DropReason::RetriesExhausted => tracing::error!(
                        mutation_id = %mutation.id,
                        document_id = %mutation.document_id(),
                        retries = failures,
                        "Sync item exceeded max retries: {}",
                        error
                    ),
                    DropReason::Permanent => tracing::error!(
                        mutation_id = %mutation.id,
                        document_id = %mutation.document_id(),
                        "Sync item rejected by remote: {}",
                        error
                    ),
                }
                report.dropped += 1;
                self.store
                    .delete::<PendingMutation>(&mutation.id.as_str())
                    .await
            }
        }
    }

    /// Fetch one page of remote changes and advance the checkpoint
    async fn pull(&self) -> Result<usize> {
        let started_at = now_millis();
        let checkpoint = self.checkpoint().await?;

        let documents = self
            .remote
            .list_modified_after(
                &self.settings.remote_collection,
                checkpoint.last_pull_at,
                self.settings.page_size,
            )
            .await?;

        let mut batch = WriteBatch::new();
        let mut count = 0;
        let mut newest = checkpoint.last_pull_at;
        for document in documents.into_iter().take(self.settings.page_size) {
            newest = newest.max(document.updated_at);
            batch = batch.put(&document.into_synced())?;
            count += 1;
        }

        // A full page may have more records behind it; resume after the
        // newest one seen instead of jumping to the pull start.
        let next = if count >= self.settings.page_size {
            newest
        } else {
            started_at.max(checkpoint.last_pull_at)
        };
        batch = batch.put(&SyncCheckpoint::new(next))?;
        self.store.apply(batch).await?;

        Ok(count)
    }
}

/// Ends the cycle when dropped, settling in `PausedOffline` if the network
/// dropped meanwhile
struct CycleGuard<'a> {
    state: &'a Mutex<SyncState>,
    network: &'a NetworkStatus,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let online = self.network.is_online();
        let mut state = self.state.lock();
        let finished = state.finish();
        *state = if online {
            finished
        } else {
            finished.went_offline()
        };
    }
}

fn log_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed(report) if report.is_clean() => {
            tracing::debug!(pushed = report.pushed, pulled = ?report.pulled, "Sync completed");
        }
        SyncOutcome::Completed(report) => tracing::warn!(
            pushed = report.pushed,
            retried = report.retried,
            dropped = report.dropped,
            "Sync completed with failures"
        ),
        SyncOutcome::Skipped { .. } => {}
    }
}
