//! Mail channel over SMTP.

use super::{ChannelKind, Message, NotificationChannel, NotificationOutcome};
use crate::config::{MailConfig, Security};
use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::time::Duration;

pub struct MailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<String>,
}

impl MailChannel {
    pub fn new(
        config: &MailConfig,
        recipients: Vec<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let builder = match config.security {
            Security::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
                .context("Failed to set up SMTPS transport")?,
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
                .context("Failed to set up STARTTLS transport")?,
            Security::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
            }
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        tracing::debug!(
            "Mail transport {}:{} (encrypted: {})",
            config.server,
            config.port,
            config.security.is_encrypted()
        );

        // The account name doubles as the sender address.
        let from = config
            .username
            .parse()
            .context("mail.username is not a valid sender address")?;

        Ok(Self {
            transport,
            from,
            recipients,
        })
    }

    fn build_email(&self, recipient: &str, message: &Message) -> anyhow::Result<lettre::Message> {
        let to: Mailbox = recipient.parse().context("Invalid recipient address")?;

        let email = lettre::Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("Failed to build mail message")?;

        Ok(email)
    }

    async fn deliver(&self, recipient: &str, message: &Message) -> anyhow::Result<()> {
        let email = self.build_email(recipient, message)?;
        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for MailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Mail
    }

    async fn send(&self, message: &Message) -> Vec<NotificationOutcome> {
        let mut outcomes = Vec::with_capacity(self.recipients.len());

        // One attempt per recipient, so one bad address doesn't sink the rest.
        for recipient in &self.recipients {
            tracing::debug!("Sending mail to {recipient}");

            match self.deliver(recipient, message).await {
                Ok(()) => {
                    tracing::info!("Mail delivered to {recipient}");
                    outcomes.push(NotificationOutcome::delivered(ChannelKind::Mail, recipient));
                }
                Err(error) => {
                    tracing::warn!("Mail to {recipient} failed: {error:#}");
                    outcomes.push(NotificationOutcome::failed(
                        ChannelKind::Mail,
                        recipient,
                        format!("{error:#}"),
                    ));
                }
            }
        }

        outcomes
    }
}
