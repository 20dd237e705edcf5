//! Keyword matching over feed items.

use crate::feed::{FeedItem, item_records};
use serde_json::Value;

/// Trigger keywords, AND-combined and matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The keywords as configured, for display.
    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, title: &str) -> bool {
        contains_all_keywords(title, &self.keywords)
    }
}

/// Returns true iff every keyword appears in `title`, ignoring ASCII case.
///
/// An empty keyword list matches any title.
pub fn contains_all_keywords(title: &str, keywords: &[String]) -> bool {
    let title = title.to_ascii_lowercase();
    keywords
        .iter()
        .all(|keyword| title.contains(&keyword.to_ascii_lowercase()))
}

/// Picks the items of `document` whose title matches `keywords`.
///
/// Results are ordered newest first by the raw `createdAt` string. The sort is
/// stable, so items with equal timestamps keep their feed order. A document
/// without an item list yields no items.
pub fn match_items(document: &Value, keywords: &KeywordSet) -> Vec<FeedItem> {
    let Some(records) = item_records(document) else {
        tracing::debug!("Feed document has no item list");
        return Vec::new();
    };

    let mut matched: Vec<FeedItem> = records
        .iter()
        .filter_map(FeedItem::from_value)
        .filter(|item| keywords.matches(&item.title))
        .collect();

    // Fixed-width zero-padded timestamps sort correctly as strings.
    matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    matched
}
