//! JSON-over-HTTP client for the remote records service.

use std::fmt;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{RemoteApi, RemoteError, RemoteResult};
use crate::models::{Document, DocumentId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Wire shape of a note on the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub vault_id: String,
    pub updated_at: i64,
}

impl From<&Document> for RemoteRecord {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            title: document.title.clone(),
            content: document.content.clone(),
            vault_id: document.vault_id.clone(),
            updated_at: document.updated_at,
        }
    }
}

impl From<RemoteRecord> for Document {
    fn from(record: RemoteRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content: record.content,
            vault_id: record.vault_id,
            updated_at: record.updated_at,
            is_synced: true,
            local_changes: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    records: Vec<RemoteRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// [`RemoteApi`] over the records service's REST routes
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> RemoteResult<Self> {
        Self::with_timeout(base_url, token, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service answers its health endpoint
    pub async fn ping(&self) -> RemoteResult<()> {
        let url = format!("{}/healthz", self.base_url);
        send_checked(self.request(Method::GET, &url)).await?;
        Ok(())
    }

    fn records_url(&self, target: &str) -> RemoteResult<String> {
        validate_target(target)?;
        Ok(format!("{}/v1/collections/{target}/records", self.base_url))
    }

    fn record_url(&self, target: &str, id: &DocumentId) -> RemoteResult<String> {
        Ok(format!("{}/{id}", self.records_url(target)?))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl RemoteApi for HttpRemote {
    async fn create(&self, target: &str, document: &Document) -> RemoteResult<()> {
        let url = self.records_url(target)?;
        send_checked(
            self.request(Method::POST, &url)
                .json(&RemoteRecord::from(document)),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, target: &str, document: &Document) -> RemoteResult<()> {
        let url = self.record_url(target, &document.id)?;
        send_checked(
            self.request(Method::PUT, &url)
                .json(&RemoteRecord::from(document)),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, target: &str, id: &DocumentId) -> RemoteResult<()> {
        let url = self.record_url(target, id)?;
        send_checked(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn list_modified_after(
        &self,
        target: &str,
        after_ms: i64,
        limit: usize,
    ) -> RemoteResult<Vec<Document>> {
        let url = self.records_url(target)?;
        let response = send_checked(
            self.request(Method::GET, &url)
                .query(&[("modified_after", after_ms.to_string()), ("limit", limit.to_string())]),
        )
        .await?;

        let payload = response
            .json::<ListRecordsResponse>()
            .await
            .map_err(|error| RemoteError::Decode(error.to_string()))?;
        Ok(payload.records.into_iter().map(Document::from).collect())
    }
}

async fn send_checked(request: RequestBuilder) -> RemoteResult<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(
                || format!("HTTP {}", status.as_u16()),
                std::string::ToString::to_string,
            )
    } else {
        compact_text(trimmed)
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}

fn validate_target(target: &str) -> RemoteResult<()> {
    let valid = !target.is_empty()
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidConfiguration(format!(
            "invalid collection name '{target}'"
        )))
    }
}
