//! The poll, match and notify loop.

use crate::{
    config::{Config, RunMode},
    error::FetchError,
    feed::{FeedItem, FeedSource, item_records},
    format::{Formatter, push_summary},
    matcher::{KeywordSet, match_items},
    notify::{ChannelKind, Message, NotificationChannel, NotificationOutcome},
    seen::SeenItems,
};
use futures::{FutureExt, future::join_all};
use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Polling,
    Notifying(Vec<FeedItem>),
    Stopped,
}

/// What a finished run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub checks: u64,
    pub outcomes: Vec<NotificationOutcome>,
}

pub struct Monitor {
    feed_url: String,
    polling_interval: Duration,
    mode: RunMode,
    subject: String,
    keywords: KeywordSet,
    formatter: Formatter,
    source: Box<dyn FeedSource>,
    channels: Vec<Box<dyn NotificationChannel>>,
    seen: SeenItems,
    checks: u64,
    last_outcomes: Vec<NotificationOutcome>,
}

impl Monitor {
    pub fn new(
        config: &Config,
        source: Box<dyn FeedSource>,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            feed_url: config.feed_url.clone(),
            polling_interval: config.polling_interval(),
            mode: config.mode,
            subject: config.subject.clone(),
            keywords: KeywordSet::new(config.keywords.iter().cloned()),
            formatter: Formatter::new(config.subject.clone(), config.notice_base_url.clone()),
            source,
            channels,
            seen: SeenItems::new(),
            checks: 0,
            last_outcomes: Vec::new(),
        }
    }

    /// Runs until the monitor stops. In continuous mode this never returns.
    pub async fn run(&mut self) -> RunSummary {
        tracing::info!(
            "Monitoring {} every {} seconds, keywords: {:?}, mode: {:?}",
            self.feed_url,
            self.polling_interval.as_secs(),
            self.keywords.as_slice(),
            self.mode
        );

        // The first check happens right away.
        let mut state = State::Polling;
        loop {
            state = match state {
                State::Stopped => break,
                state => self.advance(state).await,
            };

            if state == State::Polling {
                tracing::debug!("Waiting {}s for the next check", self.polling_interval.as_secs());
                tokio::time::sleep(self.polling_interval).await;
            }
        }

        tracing::info!("Monitor stopped after {} checks", self.checks());
        RunSummary {
            checks: self.checks(),
            outcomes: self.last_outcomes().to_vec(),
        }
    }

    /// Performs the work of `state` and returns the next state.
    pub async fn advance(&mut self, state: State) -> State {
        match state {
            State::Polling => self.poll().await,
            State::Notifying(items) => self.notify(items).await,
            State::Stopped => State::Stopped,
        }
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Outcomes of the most recent notification batch.
    pub fn last_outcomes(&self) -> &[NotificationOutcome] {
        &self.last_outcomes
    }

    async fn poll(&mut self) -> State {
        self.checks += 1;
        tracing::info!("Check #{}", self.checks);

        // A panic while fetching or matching only costs this check.
        let result = AssertUnwindSafe(self.fetch_and_match()).catch_unwind().await;

        let mut items = match result {
            Ok(Ok(items)) => items,
            Ok(Err(error)) => {
                tracing::warn!("Check #{} failed: {error}", self.checks);
                return State::Polling;
            }
            Err(panic) => {
                tracing::warn!(
                    "Check #{} aborted unexpectedly: {}",
                    self.checks,
                    panic_message(panic.as_ref())
                );
                return State::Polling;
            }
        };

        if self.mode == RunMode::Continuous {
            self.seen.retain_new(&mut items);
        }

        if items.is_empty() {
            tracing::info!("No matching items");
            return State::Polling;
        }

        tracing::info!("Found {} matching items, newest: {}", items.len(), items[0].title);
        State::Notifying(items)
    }

    async fn fetch_and_match(&self) -> Result<Vec<FeedItem>, FetchError> {
        let document = self.source.fetch(&self.feed_url).await?;
        tracing::debug!(
            "Retrieved {} items",
            item_records(&document).map(Vec::len).unwrap_or(0)
        );

        Ok(match_items(&document, &self.keywords))
    }

    async fn notify(&mut self, items: Vec<FeedItem>) -> State {
        let summary = push_summary(&items);

        // Render once per kind of channel.
        let mut messages: HashMap<ChannelKind, Message> = HashMap::new();
        for channel in &self.channels {
            let kind = channel.kind();
            messages.entry(kind).or_insert_with(|| Message {
                subject: self.subject.clone(),
                summary: summary.clone(),
                body: self.formatter.render(kind, &items, &self.keywords),
            });
        }

        let sends = self
            .channels
            .iter()
            .map(|channel| channel.send(&messages[&channel.kind()]));
        let outcomes: Vec<NotificationOutcome> =
            join_all(sends).await.into_iter().flatten().collect();

        for outcome in &outcomes {
            match &outcome.detail {
                None => tracing::info!("[{}] {}: delivered", outcome.channel, outcome.target),
                Some(detail) => tracing::warn!("[{}] {}: {detail}", outcome.channel, outcome.target),
            }
        }
        let has_mail = self.channels.iter().any(|c| c.kind() == ChannelKind::Mail);
        if has_mail && !mail_delivered(&outcomes) {
            tracing::warn!("Mail was not delivered to any recipient");
        }

        self.last_outcomes = outcomes;

        match self.mode {
            // Every channel has had its one attempt, whatever the outcome.
            RunMode::Once => State::Stopped,
            RunMode::Continuous => {
                for item in &items {
                    self.seen.record(item);
                }
                State::Polling
            }
        }
    }
}

/// True if mail reached at least one recipient.
pub fn mail_delivered(outcomes: &[NotificationOutcome]) -> bool {
    outcomes
        .iter()
        .any(|outcome| outcome.channel == ChannelKind::Mail && outcome.success)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
