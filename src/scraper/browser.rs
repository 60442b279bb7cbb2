//! Browser automation capability consumed by the session scraper.
//!
//! The scraper only sees these traits; the WebDriver client and the test
//! fakes both sit behind them.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Element locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selector {
    Css(String),
    Xpath(String),
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Selector::Xpath(value.into())
    }

    /// WebDriver location strategy name.
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Css(_) => "css selector",
            Selector::Xpath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Selector::Css(value) | Selector::Xpath(value) => value,
        }
    }

    /// Replaces every `{placeholder}` in the locator with `replacement`.
    pub fn fill_placeholder(&self, placeholder: &str, replacement: &str) -> Self {
        let pattern = format!("{{{}}}", placeholder);
        match self {
            Selector::Css(value) => Selector::Css(value.replace(&pattern, replacement)),
            Selector::Xpath(value) => Selector::Xpath(value.replace(&pattern, replacement)),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(value) => write!(f, "css={}", value),
            Selector::Xpath(value) => write!(f, "xpath={}", value),
        }
    }
}

/// Page condition to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    /// Document finished loading.
    PageLoaded,
    /// An element matching the selector exists.
    Present(Selector),
}

impl std::fmt::Display for WaitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitState::PageLoaded => write!(f, "page load"),
            WaitState::Present(selector) => write!(f, "{}", selector),
        }
    }
}

/// Errors surfaced by a browser capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    /// A wait or navigation exceeded its deadline.
    Timeout { waiting_for: String },
    /// No element matched the selector.
    NoSuchElement { selector: String },
    /// The driver could not be reached or refused to start a session.
    Unavailable { message: String },
    /// The driver answered with something unexpected.
    Protocol { message: String },
}

impl std::fmt::Display for BrowserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserError::Timeout { waiting_for } => {
                write!(f, "timed out waiting for {}", waiting_for)
            }
            BrowserError::NoSuchElement { selector } => {
                write!(f, "no element matches {}", selector)
            }
            BrowserError::Unavailable { message } => {
                write!(f, "browser unavailable: {}", message)
            }
            BrowserError::Protocol { message } => write!(f, "browser protocol error: {}", message),
        }
    }
}

impl std::error::Error for BrowserError {}

/// One isolated browsing context (own cookies, storage and page).
pub trait BrowserSession: Send {
    fn open(&mut self, url: &str) -> Result<(), BrowserError>;
    fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), BrowserError>;
    fn click(&mut self, selector: &Selector) -> Result<(), BrowserError>;
    fn wait_for(&mut self, state: &WaitState, timeout: Duration) -> Result<(), BrowserError>;
    fn read_text(&mut self, selector: &Selector) -> Result<String, BrowserError>;
    fn read_attribute(
        &mut self,
        selector: &Selector,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;
    /// Ends the context. Calling it twice is a no-op.
    fn close(&mut self) -> Result<(), BrowserError>;
}

/// Factory for isolated sessions.
pub trait Browser: Send + Sync {
    /// Checks that the automation backend is reachable before any account is tried.
    fn ensure_available(&self) -> Result<(), BrowserError>;
    fn new_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Owns a session and closes it on every exit path.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Closes the session now and reports the outcome.
    pub fn close(mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.session.close()
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.session.close() {
            tracing::warn!("failed to close browser session: {}", e);
        }
    }
}
