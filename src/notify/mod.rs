//! Notification dispatcher: Slack and email, each independent of the other.
//!
//! Transports are built once from configuration and injected, so a failing
//! channel only ever produces a [`NotificationFailure`] for itself.

pub mod email;
pub mod render;
pub mod settings;
pub mod slack;

use crate::report::types::AggregateResult;
use chrono::{Local, NaiveDate};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use settings::ChannelSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Slack,
    Email,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Slack => write!(f, "slack"),
            Channel::Email => write!(f, "email"),
        }
    }
}

/// `chat.postMessage` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackMessage {
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The remote service could not be reached.
    Transport(String),
    /// The remote service answered but refused the message.
    Rejected(String),
    /// The report file could not be attached.
    Attachment(String),
    /// The message could not be assembled.
    Build(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Transport(message) => write!(f, "transport error: {}", message),
            NotifyError::Rejected(message) => write!(f, "rejected: {}", message),
            NotifyError::Attachment(message) => write!(f, "attachment error: {}", message),
            NotifyError::Build(message) => write!(f, "invalid message: {}", message),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Blocking Slack sender.
pub trait SlackTransport: Send + Sync {
    fn post_message(&self, message: &SlackMessage) -> Result<(), NotifyError>;
}

/// Blocking email sender.
pub trait EmailTransport: Send + Sync {
    fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Writes payloads to the log instead of sending them (`--dry-run`).
pub struct LogTransport;

impl SlackTransport for LogTransport {
    fn post_message(&self, message: &SlackMessage) -> Result<(), NotifyError> {
        tracing::info!(channel = %message.channel, "dry run, Slack message:\n{}", message.text);
        Ok(())
    }
}

impl EmailTransport for LogTransport {
    fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        tracing::info!(
            to = %message.recipients.join(", "),
            subject = %message.subject,
            attachment = ?message.attachment,
            "dry run, email body:\n{}",
            message.body
        );
        Ok(())
    }
}

pub struct SlackRoute {
    pub channel_id: String,
    pub transport: Arc<dyn SlackTransport>,
}

pub struct EmailRoute {
    pub sender: String,
    pub recipients: Vec<String>,
    pub transport: Arc<dyn EmailTransport>,
}

/// Enabled channels with their transports.
#[derive(Default)]
pub struct Channels {
    pub slack: Option<SlackRoute>,
    pub email: Option<EmailRoute>,
}

impl Channels {
    /// Builds the real transports, or log-only ones when `dry_run` is set.
    pub fn from_settings(settings: &ChannelSettings, dry_run: bool) -> Result<Self, NotifyError> {
        let slack = settings.slack.as_ref().map(|config| {
            let transport: Arc<dyn SlackTransport> = if dry_run {
                Arc::new(LogTransport)
            } else {
                Arc::new(slack::SlackApi::new(&config.token))
            };
            SlackRoute {
                channel_id: config.channel_id.clone(),
                transport,
            }
        });

        let email = match settings.email.as_ref() {
            Some(config) => {
                let transport: Arc<dyn EmailTransport> = if dry_run {
                    Arc::new(LogTransport)
                } else {
                    Arc::new(email::SmtpMailer::new(config)?)
                };
                Some(EmailRoute {
                    sender: config.sender.clone(),
                    recipients: config.recipients.clone(),
                    transport,
                })
            }
            None => None,
        };

        Ok(Self { slack, email })
    }

    pub fn enabled(&self) -> Vec<Channel> {
        let mut enabled = Vec::new();
        if self.slack.is_some() {
            enabled.push(Channel::Slack);
        }
        if self.email.is_some() {
            enabled.push(Channel::Email);
        }
        enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationFailure {
    pub channel: Channel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Sent { channel: Channel },
    Failed(NotificationFailure),
}

impl ChannelOutcome {
    #[cfg(test)]
    pub fn channel(&self) -> Channel {
        match self {
            ChannelOutcome::Sent { channel } => *channel,
            ChannelOutcome::Failed(failure) => failure.channel,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelOutcome::Sent { .. })
    }
}

pub struct Dispatcher {
    channels: Channels,
    run_date: NaiveDate,
}

impl Dispatcher {
    pub fn new(channels: Channels) -> Self {
        Self {
            channels,
            run_date: Local::now().date_naive(),
        }
    }

    #[cfg(test)]
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Sends the run summary on every enabled channel concurrently.
    ///
    /// Outcomes are returned Slack first, then email. No channels is a no-op.
    pub async fn notify(
        &self,
        result: &AggregateResult,
        report_path: Option<&Path>,
    ) -> Vec<ChannelOutcome> {
        let mut sends: Vec<BoxFuture<'static, ChannelOutcome>> = Vec::new();

        if let Some(route) = &self.channels.slack {
            let message = render::slack_message(&route.channel_id, result, self.run_date);
            let transport = Arc::clone(&route.transport);
            sends.push(deliver(Channel::Slack, move || transport.post_message(&message)).boxed());
        }

        if let Some(route) = &self.channels.email {
            let message = render::email_message(
                &route.sender,
                &route.recipients,
                result,
                report_path,
                self.run_date,
            );
            let transport = Arc::clone(&route.transport);
            sends.push(deliver(Channel::Email, move || transport.send_email(&message)).boxed());
        }

        if sends.is_empty() {
            tracing::info!("no notification channels configured");
        }
        join_all(sends).await
    }
}

async fn deliver<F>(channel: Channel, send: F) -> ChannelOutcome
where
    F: FnOnce() -> Result<(), NotifyError> + Send + 'static,
{
    let sent = tokio::task::spawn_blocking(send)
        .await
        .unwrap_or_else(|e| Err(NotifyError::Transport(format!("send task aborted: {}", e))));

    match sent {
        Ok(()) => {
            tracing::info!(%channel, "notification sent");
            ChannelOutcome::Sent { channel }
        }
        Err(e) => {
            tracing::warn!(%channel, "notification failed: {}", e);
            ChannelOutcome::Failed(NotificationFailure {
                channel,
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
