//! Slack Web API transport.

use super::{NotifyError, SlackMessage, SlackTransport};
use serde::Deserialize;
use std::time::Duration;

pub const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackApi {
    agent: ureq::Agent,
    token: String,
    endpoint: String,
}

impl SlackApi {
    pub fn new(token: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            token: token.to_string(),
            endpoint: POST_MESSAGE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

impl SlackTransport for SlackApi {
    fn post_message(&self, message: &SlackMessage) -> Result<(), NotifyError> {
        let body = serde_json::to_string(message).map_err(|e| NotifyError::Build(e.to_string()))?;
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json; charset=utf-8")
            .send(&body)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        interpret_response(status, &text)
    }
}

/// Slack answers HTTP 200 with `"ok": false` for most API errors.
pub(crate) fn interpret_response(status: u16, body: &str) -> Result<(), NotifyError> {
    if !(200..300).contains(&status) {
        return Err(NotifyError::Rejected(format!("HTTP {}", status)));
    }
    let parsed: SlackResponse = serde_json::from_str(body)
        .map_err(|e| NotifyError::Rejected(format!("unreadable Slack response: {}", e)))?;
    if parsed.ok {
        Ok(())
    } else {
        Err(NotifyError::Rejected(
            parsed.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

#[cfg(test)]
#[path = "tests/slack_tests.rs"]
mod tests;
