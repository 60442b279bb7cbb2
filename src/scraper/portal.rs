//! Portal profile: where to log in, which elements to read, how long to wait.
//!
//! Every field has a default matching the carrier portal the tool was built
//! for, so a profile file only needs to list what differs.

use super::browser::Selector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Placeholder replaced by the account type inside `account_type_option`.
pub const ACCOUNT_TYPE_PLACEHOLDER: &str = "account_type";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalProfile {
    pub login_url: String,
    /// Label shown next to the balance in reports.
    pub currency: String,
    pub selectors: PortalSelectors,
    pub timeouts: PortalTimeouts,
    pub retry: RetryPolicy,
    /// chrono formats tried, in order, against the renewal date text.
    pub reset_date_formats: Vec<String>,
}

impl Default for PortalProfile {
    fn default() -> Self {
        Self {
            login_url: "https://my.te.eg/echannel/#/login".to_string(),
            currency: "EGP".to_string(),
            selectors: PortalSelectors::default(),
            timeouts: PortalTimeouts::default(),
            retry: RetryPolicy::default(),
            reset_date_formats: ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d", "%d %b %Y", "%d %B %Y"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

impl PortalProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read portal profile: {}", path.display()))?;
        let profile: Self = serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse portal profile as YAML: {}", path.display())
        })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Loads `path` when given, otherwise returns the built-in profile.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.login_url.trim().is_empty() {
            anyhow::bail!("Portal profile has an empty login_url");
        }
        if self.retry.attempts == 0 {
            anyhow::bail!("Portal profile retry.attempts must be at least 1");
        }
        let placeholder = format!("{{{}}}", ACCOUNT_TYPE_PLACEHOLDER);
        if !self.selectors.account_type_option.value().contains(&placeholder) {
            tracing::warn!(
                "account_type_option has no {} placeholder; every account selects the same option",
                placeholder
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalSelectors {
    pub phone_input: Selector,
    pub account_type_dropdown: Selector,
    pub account_type_option: Selector,
    pub password_input: Selector,
    pub login_button: Selector,
    /// Banner shown when the portal rejects credentials.
    pub login_error: Option<Selector>,
    /// Element that only exists once the dashboard has rendered.
    pub dashboard_marker: Selector,
    pub balance: Selector,
    pub remaining: Selector,
    pub used: Selector,
    /// Total quota. When absent the quota is remaining + used.
    pub quota: Option<Selector>,
    pub more_details: Option<Selector>,
    pub renewal_cost: Option<Selector>,
    pub renewal_date: Option<Selector>,
    pub logout: Option<Selector>,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            phone_input: Selector::css(r#"input[placeholder="Service number"]"#),
            account_type_dropdown: Selector::css(".ant-select-selector"),
            account_type_option: Selector::xpath(
                r#"//div[contains(@class,"ant-select-item-option") and normalize-space(.)="{account_type}"]"#,
            ),
            password_input: Selector::css(r#"input[placeholder="Password"]"#),
            login_button: Selector::xpath(r#"//button[normalize-space(.)="Login"]"#),
            login_error: Some(Selector::css(
                ".ant-message-error, .ant-form-item-explain-error",
            )),
            dashboard_marker: Selector::xpath(r#"//span[normalize-space(text())="Current Balance"]"#),
            balance: Selector::xpath(
                r#"//span[normalize-space(text())="Current Balance"]/parent::div//div[contains(@style,"font-size")]"#,
            ),
            remaining: Selector::xpath(r#"//span[contains(.,"Remaining")]/preceding-sibling::span[1]"#),
            used: Selector::xpath(r#"//span[contains(.,"Used")]/preceding-sibling::span[1]"#),
            quota: None,
            more_details: Some(Selector::xpath(r#"//span[text()="More Details"]"#)),
            renewal_cost: Some(Selector::xpath(
                r#"//span[contains(text(),"Renewal Cost")]/following-sibling::span//div[1]"#,
            )),
            renewal_date: Some(Selector::xpath(r#"//span[contains(.,"Renewal Date")]"#)),
            logout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalTimeouts {
    pub navigation_secs: u64,
    pub dashboard_secs: u64,
    /// Wait for optional or late-rendering fields.
    pub field_secs: u64,
    /// Pause after the dashboard appears, before reading values.
    pub settle_ms: u64,
}

impl Default for PortalTimeouts {
    fn default() -> Self {
        Self {
            navigation_secs: 60,
            dashboard_secs: 30,
            field_secs: 5,
            settle_ms: 2000,
        }
    }
}

impl PortalTimeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn dashboard(&self) -> Duration {
        Duration::from_secs(self.dashboard_secs)
    }

    pub fn field(&self) -> Duration {
        Duration::from_secs(self.field_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            pause_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[cfg(test)]
#[path = "tests/portal_tests.rs"]
mod tests;
