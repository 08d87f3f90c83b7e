//! reviewer-core - Core library for Note Reviewer
//!
//! This crate contains the document models, the offline store, and the sync
//! engine that drains queued mutations against the remote records service.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Document, DocumentId, MutationId, Operation, PendingMutation};
