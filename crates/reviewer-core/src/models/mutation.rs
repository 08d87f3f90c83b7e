//! Pending mutation model

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::document::{Document, DocumentId, Operation};

/// Client-generated identifier of a queued mutation (UUID v7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutationId(Uuid);

impl MutationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MutationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A durable record of a write the remote has not confirmed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: MutationId,
    pub operation: Operation,
    /// Remote collection the write targets (e.g. `notes`)
    pub target: String,
    /// Document snapshot taken at enqueue time
    pub payload: Document,
    /// Enqueue timestamp (Unix ms)
    pub enqueued_at: i64,
    /// Failed attempts so far
    pub retries: u32,
    /// Earliest time of the next attempt (Unix ms), set only when backoff is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<i64>,
    /// Message of the most recent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingMutation {
    /// Create a fresh mutation for `payload`
    #[must_use]
    pub fn new(
        operation: Operation,
        target: impl Into<String>,
        payload: Document,
        enqueued_at: i64,
    ) -> Self {
        Self {
            id: MutationId::new(),
            operation,
            target: target.into(),
            payload,
            enqueued_at,
            retries: 0,
            next_attempt_at: None,
            last_error: None,
        }
    }

    /// Id of the document this mutation writes
    #[must_use]
    pub const fn document_id(&self) -> DocumentId {
        self.payload.id
    }

    /// Whether backoff still holds this mutation back at `now`
    #[must_use]
    pub fn is_deferred(&self, now: i64) -> bool {
        self.next_attempt_at.is_some_and(|at| at > now)
    }

    /// Drain order: enqueue timestamp, then id
    #[must_use]
    pub fn drain_order(&self, other: &Self) -> Ordering {
        self.enqueued_at
            .cmp(&other.enqueued_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation_at(enqueued_at: i64) -> PendingMutation {
        PendingMutation::new(
            Operation::Create,
            "notes",
            Document::new("v", "t", "c"),
            enqueued_at,
        )
    }

    #[test]
    fn new_mutation_starts_without_retries() {
        let mutation = mutation_at(10);
        assert_eq!(mutation.retries, 0);
        assert_eq!(mutation.target, "notes");
        assert_eq!(mutation.document_id(), mutation.payload.id);
        assert!(!mutation.is_deferred(0));
    }

    #[test]
    fn drain_order_sorts_by_timestamp_then_id() {
        let late = mutation_at(20);
        let early = mutation_at(10);
        let same_ms_first = mutation_at(30);
        let same_ms_second = mutation_at(30);

        let mut queue = vec![
            same_ms_second.clone(),
            late.clone(),
            same_ms_first.clone(),
            early.clone(),
        ];
        queue.sort_by(PendingMutation::drain_order);

        let ids: Vec<_> = queue.iter().map(|m| m.id).collect();
        assert_eq!(
            ids,
            vec![early.id, late.id, same_ms_first.id, same_ms_second.id]
        );
    }

    #[test]
    fn deferred_until_next_attempt() {
        let mut mutation = mutation_at(10);
        mutation.next_attempt_at = Some(100);
        assert!(mutation.is_deferred(99));
        assert!(!mutation.is_deferred(100));
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let json = serde_json::to_value(mutation_at(1)).unwrap();
        assert!(json.get("next_attempt_at").is_none());
        assert!(json.get("last_error").is_none());
        assert_eq!(json["operation"], "create");
    }
}
