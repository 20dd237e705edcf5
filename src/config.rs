use anyhow::{Context, bail, ensure};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Link base used when the configuration does not provide one.
pub const DEFAULT_NOTICE_BASE_URL: &str = "https://dasai.lanqiao.cn/notices/";

pub const DEFAULT_SUBJECT: &str = "Notice alert";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub polling_interval_seconds: u64,
    pub feed_url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_notice_base_url")]
    pub notice_base_url: String,
    pub mail: Option<MailConfig>,
    pub push: Option<PushConfig>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Whether the monitor stops after its first notification or keeps going.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Once,
    Continuous,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub security: Security,
}

/// SMTP transport security.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Implicit TLS from the first byte (usually port 465).
    #[default]
    Ssl,
    /// Plain connection upgraded with STARTTLS.
    Tls,
    None,
}

impl Security {
    pub fn is_encrypted(self) -> bool {
        matches!(self, Security::Ssl | Security::Tls)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,
    pub uid: String,
    pub sendkey: String,
}

/// Per-operation network timeouts, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    pub fetch: u64,
    pub connect: u64,
    pub mail: u64,
    pub push: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: 15,
            connect: 10,
            mail: 30,
            push: 30,
        }
    }
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_notice_base_url() -> String {
    DEFAULT_NOTICE_BASE_URL.to_string()
}

fn default_smtp_port() -> u16 {
    465
}

impl Config {
    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        // Canonicalize the config path so we know it exists.
        let path = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve config path {}", path.display()))?;

        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: Config =
            toml::from_str(content).context("Failed to deserialize config file")?;

        // Blank keywords would match every title; drop them.
        config.keywords.retain(|keyword| !keyword.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.polling_interval_seconds > 0,
            "polling_interval_seconds must be greater than zero"
        );

        let url = url::Url::parse(&self.feed_url).context("feed_url is not a valid URL")?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "feed_url must be an http(s) URL, got scheme '{}'",
            url.scheme()
        );

        if !self.recipients.is_empty() {
            let Some(mail) = &self.mail else {
                bail!("recipients are configured but the [mail] section is missing");
            };
            ensure!(!mail.server.is_empty(), "mail.server must not be empty");
            ensure!(!mail.username.is_empty(), "mail.username must not be empty");
        }

        if let Some(push) = self.push.as_ref().filter(|push| push.enabled) {
            ensure!(
                !push.uid.is_empty() && !push.sendkey.is_empty(),
                "push.uid and push.sendkey are required when push is enabled"
            );
        }

        let timeouts = &self.timeouts;
        for (name, seconds) in [
            ("fetch", timeouts.fetch),
            ("connect", timeouts.connect),
            ("mail", timeouts.mail),
            ("push", timeouts.push),
        ] {
            ensure!(seconds > 0, "timeouts.{name} must be greater than zero");
        }

        ensure!(
            self.mail_enabled() || self.push_enabled(),
            "No notification channel is active: add recipients or enable push"
        );

        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    pub fn mail_enabled(&self) -> bool {
        self.mail.is_some() && !self.recipients.is_empty()
    }

    pub fn push_enabled(&self) -> bool {
        self.push.as_ref().is_some_and(|push| push.enabled)
    }
}
