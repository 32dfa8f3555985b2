use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::docs::types::{DocId, DocKind};
use crate::docs::Document;

const DEFAULT_BASE_URL: &str = "http://localhost:4000/api";

/// Failure talking to the document API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status when the server answered with an error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

/// Remote store of versioned documents.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// `GET /{resource}/{id}`
    async fn fetch(&self, kind: DocKind, id: DocId) -> Result<Document, ApiError>;

    /// `PUT /{resource}/{id}` with the full document. Returns the server's
    /// canonical copy, which may be normalized or timestamped.
    async fn replace(&self, doc: &Document) -> Result<Document, ApiError>;
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("FLOWLEDGER_API_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, kind: DocKind, id: DocId) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            kind.resource(),
            id
        )
    }

    async fn read_document(kind: DocKind, id: DocId, resp: reqwest::Response) -> Result<Document, ApiError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text, status),
            });
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ApiError::Decode(format!("invalid JSON: {}", e)))?;
        Document::from_value(kind, id, json)
    }
}

#[async_trait]
impl DocumentApi for ApiClient {
    async fn fetch(&self, kind: DocKind, id: DocId) -> Result<Document, ApiError> {
        let url = self.endpoint(kind, id);
        debug!(%url, "GET document");
        let resp = self.client.get(&url).send().await?;
        Self::read_document(kind, id, resp).await
    }

    async fn replace(&self, doc: &Document) -> Result<Document, ApiError> {
        let url = self.endpoint(doc.kind, doc.id);
        debug!(%url, "PUT document");
        let resp = self.client.put(&url).json(&doc.to_value()).send().await?;
        Self::read_document(doc.kind, doc.id, resp).await
    }
}

/// Pull a readable message out of an error body: `{"message": ..}` or
/// `{"error": ..}`, else the raw text, else the status reason.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["message", "error"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}
