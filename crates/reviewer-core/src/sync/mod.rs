//! Queue drain and checkpointed pull against the remote records service.

mod engine;
mod retry;
mod state;


pub use engine::{SkipReason, SyncEngine, SyncOutcome, SyncReport};
pub use retry::{DropReason, RetryDecision, RetryPolicy};
pub use state::SyncState;
