//! Remote records service consumed by the sync engine.

mod http;

use thiserror::Error;

use crate::models::{Document, DocumentId};

pub use http::{HttpRemote, RemoteRecord};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote request failed: {0}")]
    Network(String),
    #[error("Remote API error: {message} ({status})")]
    Status { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether retrying the same request cannot succeed.
    ///
    /// Client errors are permanent except request timeouts (408) and rate
    /// limiting (429); undecodable payloads are permanent too.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidConfiguration(_) | Self::Decode(_) => true,
            Self::Network(_) => false,
            Self::Status { status, .. } => {
                (400..500).contains(status) && !matches!(*status, 408 | 429)
            }
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            Self::Network(error.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Write and query access to the remote records service
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    /// Insert a new record into `target`
    async fn create(&self, target: &str, document: &Document) -> RemoteResult<()>;

    /// Replace the record with `document.id` in `target`
    async fn update(&self, target: &str, document: &Document) -> RemoteResult<()>;

    /// Remove the record `id` from `target`
    async fn delete(&self, target: &str, id: &DocumentId) -> RemoteResult<()>;

    /// Records of `target` modified strictly after `after_ms`, at most `limit`
    async fn list_modified_after(
        &self,
        target: &str,
        after_ms: i64,
        limit: usize,
    ) -> RemoteResult<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_client_errors_as_permanent() {
        let status = |status| RemoteError::Status {
            status,
            message: String::new(),
        };
        assert!(status(400).is_permanent());
        assert!(status(404).is_permanent());
        assert!(status(409).is_permanent());
        assert!(status(422).is_permanent());
        assert!(!status(408).is_permanent());
        assert!(!status(429).is_permanent());
        assert!(!status(500).is_permanent());
        assert!(!status(503).is_permanent());
        assert!(!RemoteError::Network("connection refused".into()).is_permanent());
        assert!(RemoteError::Decode("bad json".into()).is_permanent());
    }

    #[test]
    fn status_error_message_includes_code() {
        let error = RemoteError::Status {
            status: 404,
            message: "record not found".to_string(),
        };
        assert_eq!(error.to_string(), "Remote API error: record not found (404)");
    }
}
