//! Scripted browser and recording transports shared by unit tests.

use crate::accounts::AccountDescriptor;
use crate::notify::{EmailMessage, EmailTransport, NotifyError, SlackMessage, SlackTransport};
use crate::scraper::browser::{Browser, BrowserError, BrowserSession, Selector, WaitState};
use crate::scraper::portal::{PortalProfile, PortalSelectors, PortalTimeouts, RetryPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Built-in profile with every wait and pause set to zero.
pub fn fast_profile() -> PortalProfile {
    PortalProfile {
        timeouts: PortalTimeouts {
            navigation_secs: 0,
            dashboard_secs: 0,
            field_secs: 0,
            settle_ms: 0,
        },
        retry: RetryPolicy {
            attempts: 3,
            pause_ms: 0,
        },
        ..PortalProfile::default()
    }
}

pub fn account(index: usize, phone: &str) -> AccountDescriptor {
    AccountDescriptor {
        index,
        phone: phone.to_string(),
        password: format!("secret{}", index),
        account_type: "Internet".to_string(),
        name: Some(format!("Line {}", index)),
    }
}

/// What the dashboard shows after a successful login.
#[derive(Debug, Clone)]
pub struct Dashboard {
    /// Successive balance readings; the last one repeats.
    pub balance: Vec<String>,
    pub remaining: String,
    pub used: String,
    pub renewal_cost: Option<String>,
    pub renewal_date: Option<String>,
    /// Time spent "loading" after the login click.
    pub delay: Duration,
    /// How long remaining and used take to render once the dashboard shows.
    pub usage_delay: Duration,
}

impl Dashboard {
    pub fn new(balance: &str, remaining: &str, used: &str) -> Self {
        Self {
            balance: vec![balance.to_string()],
            remaining: remaining.to_string(),
            used: used.to_string(),
            renewal_cost: None,
            renewal_date: None,
            delay: Duration::ZERO,
            usage_delay: Duration::ZERO,
        }
    }

    pub fn with_balance_readings(mut self, readings: &[&str]) -> Self {
        self.balance = readings.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_renewal(mut self, cost: &str, date: &str) -> Self {
        self.renewal_cost = Some(cost.to_string());
        self.renewal_date = Some(date.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_usage_delay(mut self, delay: Duration) -> Self {
        self.usage_delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Portal {
    Dashboard(Dashboard),
    /// Login is refused with an error banner.
    RejectLogin,
    /// Login submits but nothing ever renders.
    Unresponsive,
    /// The driver connection drops when the login button is clicked.
    DriverLost,
}

#[derive(Debug, Default)]
pub struct FakeStats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    live: AtomicUsize,
    pub max_live: AtomicUsize,
    /// Phone numbers typed into the login form, in order.
    pub phones: Mutex<Vec<String>>,
}

impl FakeStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

/// Browser whose portal behaviour is scripted per phone number.
pub struct FakeBrowser {
    portals: Arc<HashMap<String, Portal>>,
    selectors: PortalSelectors,
    available: bool,
    pub stats: Arc<FakeStats>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            portals: Arc::new(HashMap::new()),
            selectors: PortalSelectors::default(),
            available: true,
            stats: Arc::new(FakeStats::default()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_portal(mut self, phone: &str, portal: Portal) -> Self {
        Arc::make_mut(&mut self.portals).insert(phone.to_string(), portal);
        self
    }
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl Browser for FakeBrowser {
    fn ensure_available(&self) -> Result<(), BrowserError> {
        if self.available {
            Ok(())
        } else {
            Err(BrowserError::Unavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    fn new_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.ensure_available()?;
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.stats.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            portals: Arc::clone(&self.portals),
            selectors: self.selectors.clone(),
            stats: Arc::clone(&self.stats),
            page: Page::Blank,
            phone: None,
            balance_reads: 0,
            dashboard_since: None,
            closed: false,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Blank,
    Login,
    Rejected,
    Loading,
    Dashboard,
    Dead,
}

struct FakeSession {
    portals: Arc<HashMap<String, Portal>>,
    selectors: PortalSelectors,
    stats: Arc<FakeStats>,
    page: Page,
    phone: Option<String>,
    balance_reads: usize,
    dashboard_since: Option<Instant>,
    closed: bool,
}

impl FakeSession {
    fn portal(&self) -> Option<&Portal> {
        self.phone.as_ref().and_then(|phone| self.portals.get(phone))
    }

    fn dashboard(&self) -> Option<&Dashboard> {
        match self.portal() {
            Some(Portal::Dashboard(dashboard)) => Some(dashboard),
            _ => None,
        }
    }

    fn is_login_form(&self, selector: &Selector) -> bool {
        let s = &self.selectors;
        *selector == s.phone_input
            || *selector == s.account_type_dropdown
            || *selector == s.password_input
            || *selector == s.login_button
            || matches!(selector, Selector::Xpath(v) if v.contains("ant-select-item-option"))
    }

    fn dashboard_text(&mut self, selector: &Selector) -> Option<String> {
        let s = self.selectors.clone();
        let dashboard = self.dashboard()?.clone();
        let usage_rendered = self
            .dashboard_since
            .is_some_and(|since| since.elapsed() >= dashboard.usage_delay);
        if *selector == s.dashboard_marker {
            Some("Current Balance".to_string())
        } else if *selector == s.balance {
            let index = self.balance_reads.min(dashboard.balance.len().saturating_sub(1));
            self.balance_reads += 1;
            dashboard.balance.get(index).cloned()
        } else if *selector == s.remaining {
            usage_rendered.then_some(dashboard.remaining)
        } else if *selector == s.used {
            usage_rendered.then_some(dashboard.used)
        } else if Some(selector) == s.more_details.as_ref() {
            Some("More Details".to_string())
        } else if Some(selector) == s.renewal_cost.as_ref() {
            dashboard.renewal_cost
        } else if Some(selector) == s.renewal_date.as_ref() {
            dashboard.renewal_date
        } else {
            None
        }
    }

    fn present(&mut self, selector: &Selector) -> bool {
        match self.page {
            Page::Login => self.is_login_form(selector),
            Page::Rejected => {
                self.is_login_form(selector) || Some(selector) == self.selectors.login_error.as_ref()
            }
            Page::Dashboard => {
                // Presence checks must not consume balance readings.
                let reads = self.balance_reads;
                let found = self.dashboard_text(selector).is_some();
                self.balance_reads = reads;
                found
            }
            Page::Blank | Page::Loading | Page::Dead => false,
        }
    }

    fn check_alive(&self) -> Result<(), BrowserError> {
        if self.page == Page::Dead {
            Err(BrowserError::Unavailable {
                message: "driver connection reset".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn missing(selector: &Selector) -> BrowserError {
        BrowserError::NoSuchElement {
            selector: selector.to_string(),
        }
    }
}

impl BrowserSession for FakeSession {
    fn open(&mut self, _url: &str) -> Result<(), BrowserError> {
        self.check_alive()?;
        self.page = Page::Login;
        Ok(())
    }

    fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), BrowserError> {
        self.check_alive()?;
        if !self.present(selector) {
            return Err(Self::missing(selector));
        }
        if *selector == self.selectors.phone_input {
            self.phone = Some(value.to_string());
            if let Ok(mut phones) = self.stats.phones.lock() {
                phones.push(value.to_string());
            }
        }
        Ok(())
    }

    fn click(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.check_alive()?;
        if !self.present(selector) {
            return Err(Self::missing(selector));
        }
        if *selector == self.selectors.login_button {
            self.page = match self.portal() {
                Some(Portal::Dashboard(dashboard)) => {
                    std::thread::sleep(dashboard.delay);
                    self.dashboard_since = Some(Instant::now());
                    Page::Dashboard
                }
                Some(Portal::Unresponsive) => Page::Loading,
                Some(Portal::DriverLost) => Page::Dead,
                Some(Portal::RejectLogin) | None => Page::Rejected,
            };
        }
        Ok(())
    }

    fn wait_for(&mut self, state: &WaitState, timeout: Duration) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            self.check_alive()?;
            let ready = match state {
                WaitState::PageLoaded => self.page != Page::Blank,
                WaitState::Present(selector) => self.present(selector),
            };
            if ready {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    waiting_for: state.to_string(),
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn read_text(&mut self, selector: &Selector) -> Result<String, BrowserError> {
        self.check_alive()?;
        match self.page {
            Page::Rejected if Some(selector) == self.selectors.login_error.as_ref() => {
                Ok("Invalid service number or password".to_string())
            }
            Page::Dashboard => self
                .dashboard_text(selector)
                .ok_or_else(|| Self::missing(selector)),
            _ => Err(Self::missing(selector)),
        }
    }

    fn read_attribute(
        &mut self,
        selector: &Selector,
        _name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.check_alive()?;
        if self.present(selector) {
            Ok(None)
        } else {
            Err(Self::missing(selector))
        }
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if !self.closed {
            self.closed = true;
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Slack transport that records messages, or fails every send.
#[derive(Clone, Default)]
pub struct RecordingSlack {
    pub sent: Arc<Mutex<Vec<SlackMessage>>>,
    pub fail_with: Option<String>,
}

impl RecordingSlack {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SlackMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl SlackTransport for RecordingSlack {
    fn post_message(&self, message: &SlackMessage) -> Result<(), NotifyError> {
        if let Some(reason) = &self.fail_with {
            return Err(NotifyError::Rejected(reason.clone()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Email transport that records messages, or fails every send.
#[derive(Clone, Default)]
pub struct RecordingEmail {
    pub sent: Arc<Mutex<Vec<EmailMessage>>>,
    pub fail_with: Option<String>,
}

impl RecordingEmail {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl EmailTransport for RecordingEmail {
    fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if let Some(reason) = &self.fail_with {
            return Err(NotifyError::Transport(reason.clone()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
