//! Session scraper: one authenticated portal session per account.

pub mod browser;
pub mod parse;
pub mod portal;
pub mod webdriver;

use crate::accounts::AccountDescriptor;
use crate::report::types::{ScrapeErrorKind, ScrapeFailure, UsageRecord};
use browser::{Browser, BrowserError, BrowserSession, SessionGuard, Selector, WaitState};
use chrono::Utc;
use portal::{PortalProfile, ACCOUNT_TYPE_PLACEHOLDER};
use std::sync::Arc;
use std::time::Duration;

/// Internal scrape error, turned into a [`ScrapeFailure`] at the component edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeError {
    pub kind: ScrapeErrorKind,
    pub message: String,
}

impl ScrapeError {
    fn new(kind: ScrapeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ScrapeError {}

impl From<BrowserError> for ScrapeError {
    fn from(error: BrowserError) -> Self {
        let kind = match error {
            BrowserError::NoSuchElement { .. } => ScrapeErrorKind::ParseFailure,
            BrowserError::Timeout { .. }
            | BrowserError::Unavailable { .. }
            | BrowserError::Protocol { .. } => ScrapeErrorKind::NavigationTimeout,
        };
        Self::new(kind, error.to_string())
    }
}

/// Errors that end the session outright instead of being retried.
fn is_connection_loss(error: &BrowserError) -> bool {
    matches!(
        error,
        BrowserError::Unavailable { .. } | BrowserError::Timeout { .. }
    )
}

pub struct SessionScraper {
    browser: Arc<dyn Browser>,
    profile: PortalProfile,
}

impl SessionScraper {
    pub fn new(browser: Arc<dyn Browser>, profile: PortalProfile) -> Self {
        Self { browser, profile }
    }

    pub fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    /// Probes the browser backend once, before any account is attempted.
    pub fn ensure_available(&self) -> Result<(), BrowserError> {
        self.browser.ensure_available()
    }

    /// Logs in as `account`, reads the dashboard and tears the session down.
    ///
    /// Blocking. Every error is returned as a [`ScrapeFailure`]; the browser
    /// session is closed on every path.
    pub fn scrape(&self, account: &AccountDescriptor) -> Result<UsageRecord, ScrapeFailure> {
        let span = tracing::info_span!("scrape", account = account.index);
        let _entered = span.enter();
        tracing::info!(name = %account.display_name(), "scraping account");

        self.run_session(account).map_err(|e| {
            tracing::warn!(kind = %e.kind, "scrape failed: {}", e.message);
            ScrapeFailure {
                account: account.reference(),
                kind: e.kind,
                message: e.message,
            }
        })
    }

    fn run_session(&self, account: &AccountDescriptor) -> Result<UsageRecord, ScrapeError> {
        let session = self.browser.new_session().map_err(|e| {
            ScrapeError::new(
                ScrapeErrorKind::NavigationTimeout,
                format!("could not start a browser session: {}", e),
            )
        })?;
        let mut session = SessionGuard::new(session);

        self.login(&mut *session, account)?;
        let record = self.read_dashboard(&mut *session, account)?;

        if let Some(logout) = &self.profile.selectors.logout {
            if let Err(e) = session.click(logout) {
                tracing::debug!("logout skipped: {}", e);
            }
        }
        if let Err(e) = session.close() {
            tracing::warn!("failed to close browser session: {}", e);
        }
        Ok(record)
    }

    fn login(
        &self,
        session: &mut dyn BrowserSession,
        account: &AccountDescriptor,
    ) -> Result<(), ScrapeError> {
        let selectors = &self.profile.selectors;
        let timeouts = &self.profile.timeouts;

        session.open(&self.profile.login_url)?;
        session.wait_for(&WaitState::PageLoaded, timeouts.navigation())?;
        session.wait_for(
            &WaitState::Present(selectors.phone_input.clone()),
            timeouts.navigation(),
        )?;

        session.fill(&selectors.phone_input, &account.phone)?;
        session.click(&selectors.account_type_dropdown)?;
        let option = selectors
            .account_type_option
            .fill_placeholder(ACCOUNT_TYPE_PLACEHOLDER, &account.account_type);
        session
            .wait_for(&WaitState::Present(option.clone()), timeouts.field())
            .map_err(|e| match e {
                BrowserError::Timeout { .. } => ScrapeError::new(
                    ScrapeErrorKind::ParseFailure,
                    format!(
                        "account type '{}' is not offered by the portal",
                        account.account_type
                    ),
                ),
                other => other.into(),
            })?;
        session.click(&option)?;
        session.fill(&selectors.password_input, &account.password)?;
        session.click(&selectors.login_button)?;

        match session.wait_for(
            &WaitState::Present(selectors.dashboard_marker.clone()),
            timeouts.dashboard(),
        ) {
            Ok(()) => {}
            Err(BrowserError::Timeout { .. }) => return Err(self.diagnose_login(session)),
            Err(e) => return Err(e.into()),
        }

        let settle = timeouts.settle();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        tracing::debug!("dashboard reached");
        Ok(())
    }

    /// Tells a rejected login apart from an unresponsive portal.
    fn diagnose_login(&self, session: &mut dyn BrowserSession) -> ScrapeError {
        let selectors = &self.profile.selectors;

        if let Some(error_banner) = &selectors.login_error {
            if let Ok(text) = session.read_text(error_banner) {
                let message = if text.is_empty() {
                    "portal rejected login".to_string()
                } else {
                    format!("portal rejected login: {}", text)
                };
                return ScrapeError::new(ScrapeErrorKind::AuthenticationFailure, message);
            }
        }

        let form_still_shown = session
            .wait_for(
                &WaitState::Present(selectors.phone_input.clone()),
                Duration::ZERO,
            )
            .is_ok();
        if form_still_shown {
            ScrapeError::new(
                ScrapeErrorKind::AuthenticationFailure,
                "login form still present after submit",
            )
        } else {
            ScrapeError::new(
                ScrapeErrorKind::NavigationTimeout,
                format!(
                    "dashboard did not load within {}s",
                    self.profile.timeouts.dashboard_secs
                ),
            )
        }
    }

    fn read_dashboard(
        &self,
        session: &mut dyn BrowserSession,
        account: &AccountDescriptor,
    ) -> Result<UsageRecord, ScrapeError> {
        let selectors = &self.profile.selectors;

        // Zero means the widget has not rendered yet.
        let balance = self.read_number(session, &selectors.balance, "balance", |v| v != 0.0)?;
        let remaining_gb = self.read_number(session, &selectors.remaining, "remaining", |_| true)?;
        let consumed_gb = self.read_number(session, &selectors.used, "used", |_| true)?;
        let quota_gb = match &selectors.quota {
            Some(quota) => self.read_number(session, quota, "quota", |_| true)?,
            None => remaining_gb + consumed_gb,
        };

        if let Some(details) = &selectors.more_details {
            let opened = self.optional(
                "more details",
                session
                    .wait_for(&WaitState::Present(details.clone()), self.profile.timeouts.field())
                    .and_then(|()| session.click(details)),
            )?;
            if opened.is_some() {
                let settle = self.profile.timeouts.settle();
                if !settle.is_zero() {
                    std::thread::sleep(settle);
                }
            }
        }

        let renewal_cost = match &selectors.renewal_cost {
            Some(selector) => self
                .read_optional_text(session, selector, "renewal cost")?
                .and_then(|text| parse::parse_number(&text)),
            None => None,
        };
        let reset_date = match &selectors.renewal_date {
            Some(selector) => self
                .read_optional_text(session, selector, "renewal date")?
                .as_deref()
                .and_then(parse::extract_reset_date)
                .map(|raw| parse::parse_reset_date(raw, &self.profile.reset_date_formats)),
            None => None,
        };

        tracing::info!(balance, remaining_gb, consumed_gb, quota_gb, "usage read");
        Ok(UsageRecord {
            account: account.reference(),
            balance,
            currency: self.profile.currency.clone(),
            quota_gb,
            consumed_gb,
            remaining_gb,
            renewal_cost,
            reset_date,
            scraped_at: Utc::now(),
        })
    }

    /// Reads a numeric field, retrying until `accept` holds.
    ///
    /// A value that parsed but was never accepted is returned after the last
    /// attempt.
    fn read_number(
        &self,
        session: &mut dyn BrowserSession,
        selector: &Selector,
        field: &'static str,
        accept: impl Fn(f64) -> bool,
    ) -> Result<f64, ScrapeError> {
        let attempts = self.profile.retry.attempts.max(1);
        let mut fallback = None;
        let mut last_error =
            ScrapeError::new(ScrapeErrorKind::ParseFailure, format!("{} not found", field));

        for attempt in 1..=attempts {
            match self.read_field(session, selector, field)? {
                Ok(text) => match parse::parse_number(&text) {
                    Some(value) if accept(value) => return Ok(value),
                    Some(value) => fallback = Some(value),
                    None => {
                        last_error = ScrapeError::new(
                            ScrapeErrorKind::ParseFailure,
                            format!("{} is not numeric: '{}'", field, text),
                        )
                    }
                },
                Err(miss) => last_error = miss,
            }
            if attempt < attempts {
                tracing::debug!(field, attempt, "retrying field read");
                std::thread::sleep(self.profile.retry.pause());
            }
        }

        fallback.ok_or(last_error)
    }

    /// Waits up to the field timeout for `selector`, then reads it.
    ///
    /// The outer error ends the scrape; the inner one is a miss worth
    /// retrying.
    fn read_field(
        &self,
        session: &mut dyn BrowserSession,
        selector: &Selector,
        field: &'static str,
    ) -> Result<Result<String, ScrapeError>, ScrapeError> {
        let timeout = self.profile.timeouts.field();
        let read = match session.wait_for(&WaitState::Present(selector.clone()), timeout) {
            Ok(()) => session.read_text(selector),
            Err(BrowserError::Timeout { .. }) => {
                return Ok(Err(ScrapeError::new(
                    ScrapeErrorKind::ParseFailure,
                    format!("{} did not appear within {}s", field, timeout.as_secs()),
                )))
            }
            Err(e) => Err(e),
        };

        match read {
            Ok(text) => Ok(Ok(text)),
            Err(e) if is_connection_loss(&e) => Err(e.into()),
            Err(e) => Ok(Err(ScrapeError::new(
                ScrapeErrorKind::ParseFailure,
                format!("{} unreadable: {}", field, e),
            ))),
        }
    }

    fn read_optional_text(
        &self,
        session: &mut dyn BrowserSession,
        selector: &Selector,
        field: &'static str,
    ) -> Result<Option<String>, ScrapeError> {
        let text = self.optional(
            field,
            session
                .wait_for(&WaitState::Present(selector.clone()), self.profile.timeouts.field())
                .and_then(|()| session.read_text(selector)),
        )?;
        Ok(text.filter(|t| !t.is_empty()))
    }

    fn optional<T>(
        &self,
        field: &'static str,
        result: Result<T, BrowserError>,
    ) -> Result<Option<T>, ScrapeError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e @ BrowserError::Unavailable { .. }) => Err(e.into()),
            Err(e) => {
                tracing::debug!(field, "optional field skipped: {}", e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/scraper_tests.rs"]
mod tests;
