//! Feed retrieval and item extraction.

use crate::{config::Timeouts, error::FetchError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Name of the field holding the item list in a feed document.
pub const ITEM_LIST_FIELD: &str = "datalist";

/// Anything that can turn a URL into a parsed JSON document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError>;
}

/// HTTP feed client. One attempt per call, no retries.
pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(timeouts: &Timeouts) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("notice-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeouts.fetch))
            .connect_timeout(Duration::from_secs(timeouts.connect))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        tracing::debug!("Retrieving feed from {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content = response.text().await.map_err(FetchError::Body)?;
        parse_document(&content)
    }
}

pub fn parse_document(content: &str) -> Result<Value, FetchError> {
    Ok(serde_json::from_str(content)?)
}

/// One notice from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub created_at: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub id: Option<i64>,
}

impl FeedItem {
    /// Extracts an item from its JSON record.
    ///
    /// Returns `None` when the record has no usable title. Optional fields of
    /// the wrong type are treated as absent. Both the canonical field names and
    /// the ones used by the upstream notice API are accepted.
    pub fn from_value(value: &Value) -> Option<Self> {
        let title = value.get("title")?.as_str()?;
        if title.is_empty() {
            return None;
        }

        Some(Self {
            title: title.to_string(),
            created_at: string_field(value, &["createdAt", "creatTime"]),
            category: string_field(value, &["category", "programaName"]),
            summary: string_field(value, &["summary", "synopsis"]),
            id: ["id", "nnid"]
                .iter()
                .find_map(|name| value.get(*name).and_then(Value::as_i64)),
        })
    }

    /// A stable identity for deduplication within a run.
    pub fn key(&self) -> String {
        match self.id {
            Some(id) => format!("id:{id}"),
            None => format!(
                "{}-{}",
                self.title,
                self.created_at.as_deref().unwrap_or("no-date")
            ),
        }
    }
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| value.get(*name).and_then(Value::as_str))
        .map(str::to_string)
}

/// Returns the raw item records of a document, or `None` if the item list is
/// missing or not an array.
pub fn item_records(document: &Value) -> Option<&Vec<Value>> {
    document.get(ITEM_LIST_FIELD)?.as_array()
}
