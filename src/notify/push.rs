//! Push channel through a ServerChan-style relay.

use super::{ChannelKind, Message, NotificationChannel, NotificationOutcome};
use crate::config::PushConfig;
use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// The relay reports success with this `code`.
const SUCCESS_CODE: i64 = 0;

pub struct PushChannel {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl PushChannel {
    pub fn new(config: &PushConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint(config),
        })
    }

    async fn post(&self, message: &Message) -> anyhow::Result<()> {
        let payload = json!({
            "title": message.subject,
            "desp": message.body,
            "short": message.summary,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach push relay")?;

        let status = response.status();
        let body = response.text().await.context("No text in relay response")?;
        tracing::trace!(push_response = body.as_str());

        if !status.is_success() {
            bail!("Push relay responded with HTTP {status}: {body}");
        }

        check_response(&body)
    }
}

/// Builds the relay endpoint from the two credentials.
fn endpoint(config: &PushConfig) -> String {
    format!(
        "https://{}.push.ft07.com/send/{}.send",
        config.uid, config.sendkey
    )
}

/// Only `"code": 0` counts as delivered.
fn check_response(body: &str) -> anyhow::Result<()> {
    let response: RelayResponse =
        serde_json::from_str(body).context("Malformed push relay response")?;

    match response.code {
        Some(SUCCESS_CODE) => Ok(()),
        Some(code) => bail!(
            "Push relay rejected the message (code {code}): {}",
            response.message.unwrap_or_default()
        ),
        None => bail!("Push relay response has no status code"),
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(&self, message: &Message) -> Vec<NotificationOutcome> {
        tracing::debug!("Sending push notification: {}", message.summary);

        let outcome = match self.post(message).await {
            Ok(()) => {
                tracing::info!("Push notification delivered");
                NotificationOutcome::delivered(ChannelKind::Push, "push relay")
            }
            Err(error) => {
                tracing::warn!("Push notification failed: {error:#}");
                NotificationOutcome::failed(ChannelKind::Push, "push relay", format!("{error:#}"))
            }
        };

        vec![outcome]
    }
}
