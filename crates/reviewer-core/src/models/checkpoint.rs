//! Sync checkpoint and status snapshot

use serde::{Deserialize, Serialize};

use crate::sync::SyncState;

/// Lower bound (Unix ms) for the next pull of remote changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub last_pull_at: i64,
}

impl SyncCheckpoint {
    /// Metadata key the checkpoint is stored under
    pub const KEY: &'static str = "last_sync";

    pub const fn new(last_pull_at: i64) -> Self {
        Self { last_pull_at }
    }
}

/// Point-in-time view of the offline queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub pending_mutations: usize,
    pub unsynced_documents: usize,
    /// Last successful pull (Unix ms), 0 if never
    pub last_sync: i64,
    pub is_online: bool,
    pub state: SyncState,
}
