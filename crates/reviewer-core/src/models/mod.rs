//! Data models for Note Reviewer

mod checkpoint;
mod document;
mod mutation;

pub use checkpoint::{SyncCheckpoint, SyncStatus};
pub use document::{Document, DocumentId, LocalChange, Operation};
pub use mutation::{MutationId, PendingMutation};
