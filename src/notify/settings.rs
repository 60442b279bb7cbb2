//! Which channels are enabled, read from configuration.

use crate::config::{ConfigError, ConfigSource};

pub const SLACK_TOKEN_KEY: &str = "SLACK_BOT_TOKEN";
pub const SLACK_CHANNEL_KEY: &str = "SLACK_CHANNEL_ID";
pub const EMAIL_SENDER_KEY: &str = "EMAIL_SENDER";
pub const EMAIL_PASSWORD_KEY: &str = "EMAIL_PASSWORD";
pub const EMAIL_RECIPIENT_KEY: &str = "EMAIL_RECIPIENT";
pub const EMAIL_RECIPIENTS_KEY: &str = "EMAIL_RECIPIENTS";
pub const EMAIL_SMTP_HOST_KEY: &str = "EMAIL_SMTP_HOST";
pub const EMAIL_SMTP_PORT_KEY: &str = "EMAIL_SMTP_PORT";

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// Implicit TLS.
pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub token: String,
    pub channel_id: String,
}

impl std::fmt::Debug for SlackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSettings")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub sender: String,
    pub password: String,
    pub recipients: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .field("recipients", &self.recipients)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    pub slack: Option<SlackSettings>,
    pub email: Option<EmailSettings>,
}

impl ChannelSettings {
    pub fn from_config(config: &ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            slack: slack_settings(config),
            email: email_settings(config)?,
        })
    }
}

fn slack_settings(config: &ConfigSource) -> Option<SlackSettings> {
    match (config.get(SLACK_TOKEN_KEY), config.get(SLACK_CHANNEL_KEY)) {
        (Some(token), Some(channel_id)) => Some(SlackSettings {
            token: token.to_string(),
            channel_id: channel_id.to_string(),
        }),
        (None, None) => None,
        (Some(_), None) => {
            tracing::warn!("Slack disabled: {} is not set", SLACK_CHANNEL_KEY);
            None
        }
        (None, Some(_)) => {
            tracing::warn!("Slack disabled: {} is not set", SLACK_TOKEN_KEY);
            None
        }
    }
}

fn email_settings(config: &ConfigSource) -> Result<Option<EmailSettings>, ConfigError> {
    let sender = config.get(EMAIL_SENDER_KEY);
    let password = config.get(EMAIL_PASSWORD_KEY);
    let recipients = recipients(config);

    let (sender, password) = match (sender, password, recipients.is_empty()) {
        (Some(sender), Some(password), false) => (sender, password),
        (None, None, true) => return Ok(None),
        _ => {
            let missing: Vec<&str> = [
                (EMAIL_SENDER_KEY, sender.is_none()),
                (EMAIL_PASSWORD_KEY, password.is_none()),
                (EMAIL_RECIPIENTS_KEY, recipients.is_empty()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(key, _)| *key)
            .collect();
            tracing::warn!("email disabled: missing {}", missing.join(", "));
            return Ok(None);
        }
    };

    Ok(Some(EmailSettings {
        sender: sender.to_string(),
        password: password.to_string(),
        recipients,
        smtp_host: config
            .get(EMAIL_SMTP_HOST_KEY)
            .unwrap_or(DEFAULT_SMTP_HOST)
            .to_string(),
        smtp_port: config
            .get_u16(EMAIL_SMTP_PORT_KEY)?
            .unwrap_or(DEFAULT_SMTP_PORT),
    }))
}

/// `EMAIL_RECIPIENTS` wins over the single `EMAIL_RECIPIENT`.
fn recipients(config: &ConfigSource) -> Vec<String> {
    config
        .get(EMAIL_RECIPIENTS_KEY)
        .map(parse_recipients)
        .filter(|list| !list.is_empty())
        .or_else(|| {
            config
                .get(EMAIL_RECIPIENT_KEY)
                .map(|single| vec![single.to_string()])
        })
        .unwrap_or_default()
}

/// Splits a comma-separated address list, dropping blanks.
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
