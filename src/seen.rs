use crate::feed::FeedItem;
use std::collections::HashSet;

/// Items already notified during this run. Lives in memory only.
#[derive(Debug, Default)]
pub struct SeenItems {
    keys: HashSet<String>,
}

impl SeenItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new(&self, item: &FeedItem) -> bool {
        !self.keys.contains(&item.key())
    }

    pub fn record(&mut self, item: &FeedItem) {
        self.keys.insert(item.key());
    }

    /// Drops every item that has already been recorded.
    pub fn retain_new(&self, items: &mut Vec<FeedItem>) {
        items.retain(|item| self.is_new(item));
    }
}
