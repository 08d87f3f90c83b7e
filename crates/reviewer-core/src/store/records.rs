//! `Record` implementations for the stored models

use super::{bool_key, Collection, Index, Record};
use crate::models::{Document, PendingMutation, SyncCheckpoint};

impl Record for Document {
    const COLLECTION: Collection = Collection::Documents;

    fn key(&self) -> String {
        self.id.as_str()
    }

    fn index_entries(&self) -> Vec<(Index, String)> {
        vec![
            (Index::VaultId, self.vault_id.clone()),
            (Index::SyncStatus, bool_key(self.is_synced).to_string()),
            (Index::UpdatedAt, self.updated_at.to_string()),
        ]
    }
}

impl Record for PendingMutation {
    const COLLECTION: Collection = Collection::PendingMutations;

    fn key(&self) -> String {
        self.id.as_str()
    }

    fn index_entries(&self) -> Vec<(Index, String)> {
        vec![
            (Index::EnqueuedAt, self.enqueued_at.to_string()),
            (Index::Target, self.target.clone()),
            (Index::DocumentId, self.document_id().as_str()),
        ]
    }
}

impl Record for SyncCheckpoint {
    const COLLECTION: Collection = Collection::Metadata;

    fn key(&self) -> String {
        Self::KEY.to_string()
    }
}
