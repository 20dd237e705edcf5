//! Notification channels.
//!
//! Every channel takes a rendered [`Message`] and reports one
//! [`NotificationOutcome`] per delivery attempt. Channels never retry and never
//! fail outright: errors are folded into the outcomes.

mod mail;
mod push;

pub use mail::MailChannel;
pub use push::PushChannel;

use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use std::{fmt, time::Duration};

/// Which rendering a channel expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Mail,
    Push,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Mail => write!(f, "mail"),
            ChannelKind::Push => write!(f, "push"),
        }
    }
}

/// Content handed to a channel for one matched batch.
#[derive(Debug, Clone)]
pub struct Message {
    /// Fixed per run.
    pub subject: String,
    /// Single line, used by channels that show a preview.
    pub summary: String,
    /// Rendered for the receiving channel's kind.
    pub body: String,
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationOutcome {
    pub channel: ChannelKind,
    pub target: String,
    pub success: bool,
    pub detail: Option<String>,
}

impl NotificationOutcome {
    pub fn delivered(channel: ChannelKind, target: impl Into<String>) -> Self {
        Self {
            channel,
            target: target.into(),
            success: true,
            detail: None,
        }
    }

    pub fn failed(
        channel: ChannelKind,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            target: target.into(),
            success: false,
            detail: Some(detail.into()),
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Attempts delivery once to every target of this channel.
    async fn send(&self, message: &Message) -> Vec<NotificationOutcome>;
}

/// Builds every channel the configuration activates.
pub fn build_channels(config: &Config) -> anyhow::Result<Vec<Box<dyn NotificationChannel>>> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

    if let Some(mail) = config.mail.as_ref().filter(|_| config.mail_enabled()) {
        let channel = MailChannel::new(
            mail,
            config.recipients.clone(),
            Duration::from_secs(config.timeouts.mail),
        )
        .context("Failed to set up mail channel")?;
        tracing::info!("Mail channel active for {} recipients", config.recipients.len());
        channels.push(Box::new(channel));
    }

    if let Some(push) = config.push.as_ref().filter(|_| config.push_enabled()) {
        let channel = PushChannel::new(push, Duration::from_secs(config.timeouts.push))
            .context("Failed to set up push channel")?;
        tracing::info!("Push channel active");
        channels.push(Box::new(channel));
    }

    Ok(channels)
}
