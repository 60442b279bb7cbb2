//! W3C WebDriver client for the browser capability.
//!
//! Talks JSON over HTTP to a running driver (chromedriver, geckodriver or a
//! Selenium grid). Every account gets its own WebDriver session, so cookies
//! and storage never cross accounts.

use super::browser::{Browser, BrowserError, BrowserSession, Selector, WaitState};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Extra time allowed on top of the page-load timeout for a single HTTP exchange.
const REQUEST_SLACK: Duration = Duration::from_secs(30);

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    pub url: String,
    pub browser_name: String,
    pub headless: bool,
    pub page_load_timeout: Duration,
}

impl Default for WebDriverOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBDRIVER_URL.to_string(),
            browser_name: "chrome".to_string(),
            headless: true,
            page_load_timeout: Duration::from_secs(60),
        }
    }
}

enum Method {
    Get,
    Post(Value),
    Delete,
}

#[derive(Clone)]
struct WireClient {
    agent: ureq::Agent,
    base_url: String,
}

impl WireClient {
    fn new(base_url: &str, request_timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn call(&self, method: Method, path: &str) -> Result<Value, BrowserError> {
        let url = format!("{}{}", self.base_url, path);
        let response = match method {
            Method::Get => self.agent.get(&url).call(),
            Method::Delete => self.agent.delete(&url).call(),
            Method::Post(body) => {
                let body = serde_json::to_string(&body).map_err(|e| BrowserError::Protocol {
                    message: format!("could not encode request: {}", e),
                })?;
                self.agent
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .send(&body)
            }
        };

        let mut response = response.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(transport_error)?;
        decode_response(status, &body)
    }
}

fn transport_error(error: ureq::Error) -> BrowserError {
    match error {
        ureq::Error::Timeout(_) => BrowserError::Timeout {
            waiting_for: "driver response".to_string(),
        },
        other => BrowserError::Unavailable {
            message: other.to_string(),
        },
    }
}

/// Unwraps the `value` member of a WebDriver response, mapping error payloads.
pub(crate) fn decode_response(status: u16, body: &str) -> Result<Value, BrowserError> {
    let parsed: Value = serde_json::from_str(body).map_err(|_| BrowserError::Protocol {
        message: format!("HTTP {} with a non-JSON body", status),
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(classify_error(code, message));
    }

    if !(200..300).contains(&status) {
        return Err(BrowserError::Protocol {
            message: format!("HTTP {}", status),
        });
    }

    Ok(value)
}

/// Maps a WebDriver error code to a browser error.
pub(crate) fn classify_error(code: &str, message: String) -> BrowserError {
    match code {
        "no such element" | "stale element reference" => {
            BrowserError::NoSuchElement { selector: message }
        }
        "timeout" | "script timeout" => BrowserError::Timeout {
            waiting_for: message,
        },
        "invalid session id" | "session not created" | "no such window" => {
            BrowserError::Unavailable { message }
        }
        _ => BrowserError::Protocol {
            message: format!("{}: {}", code, message),
        },
    }
}

/// Session capabilities requested from the driver.
pub(crate) fn capabilities(options: &WebDriverOptions) -> Value {
    let mut always_match = json!({ "browserName": options.browser_name });
    if options.headless {
        let args = json!(["--headless=new", "--disable-gpu", "--no-sandbox"]);
        always_match["goog:chromeOptions"] = json!({ "args": args });
        always_match["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
    }
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// Browser capability backed by a WebDriver endpoint.
pub struct WebDriverBrowser {
    client: WireClient,
    options: WebDriverOptions,
}

impl WebDriverBrowser {
    pub fn new(options: WebDriverOptions) -> Self {
        let client = WireClient::new(&options.url, options.page_load_timeout + REQUEST_SLACK);
        Self { client, options }
    }
}

impl Browser for WebDriverBrowser {
    fn ensure_available(&self) -> Result<(), BrowserError> {
        let status = self.client.call(Method::Get, "/status")?;
        if status.get("ready").and_then(Value::as_bool) == Some(false) {
            let message = status
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("driver reports not ready")
                .to_string();
            return Err(BrowserError::Unavailable { message });
        }
        Ok(())
    }

    fn new_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let value = self
            .client
            .call(Method::Post(capabilities(&self.options)), "/session")?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol {
                message: "new session response has no sessionId".to_string(),
            })?
            .to_string();
        tracing::debug!(%session_id, "webdriver session started");

        let mut session = WebDriverSession {
            client: self.client.clone(),
            session_id,
            closed: false,
        };
        if let Err(e) = session.set_page_load_timeout(self.options.page_load_timeout) {
            let _ = session.close();
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

struct WebDriverSession {
    client: WireClient,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.session_id, suffix)
    }

    fn find(&self, selector: &Selector) -> Result<String, BrowserError> {
        let request = json!({ "using": selector.strategy(), "value": selector.value() });
        let value = self
            .client
            .call(Method::Post(request), &self.path("/element"))
            .map_err(|e| match e {
                BrowserError::NoSuchElement { .. } => BrowserError::NoSuchElement {
                    selector: selector.to_string(),
                },
                other => other,
            })?;
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Protocol {
                message: format!("find {} returned no element reference", selector),
            })
    }

    fn element_call(&self, method: Method, element: &str, suffix: &str) -> Result<Value, BrowserError> {
        let path = self.path(&format!("/element/{}{}", element, suffix));
        self.client.call(method, &path)
    }

    fn set_page_load_timeout(&self, timeout: Duration) -> Result<(), BrowserError> {
        let request = json!({ "pageLoad": timeout.as_millis() as u64 });
        self.client
            .call(Method::Post(request), &self.path("/timeouts"))
            .map(|_| ())
    }

    fn ready_state(&self) -> Result<String, BrowserError> {
        let request = json!({ "script": "return document.readyState", "args": [] });
        let value = self
            .client
            .call(Method::Post(request), &self.path("/execute/sync"))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn condition_met(&self, state: &WaitState) -> Result<bool, BrowserError> {
        match state {
            WaitState::PageLoaded => Ok(self.ready_state()? == "complete"),
            WaitState::Present(selector) => match self.find(selector) {
                Ok(_) => Ok(true),
                Err(BrowserError::NoSuchElement { .. }) => Ok(false),
                Err(e) => Err(e),
            },
        }
    }
}

impl BrowserSession for WebDriverSession {
    fn open(&mut self, url: &str) -> Result<(), BrowserError> {
        self.client
            .call(Method::Post(json!({ "url": url })), &self.path("/url"))
            .map(|_| ())
    }

    fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), BrowserError> {
        let element = self.find(selector)?;
        self.element_call(Method::Post(json!({})), &element, "/clear")?;
        self.element_call(Method::Post(json!({ "text": value })), &element, "/value")?;
        Ok(())
    }

    fn click(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        let element = self.find(selector)?;
        self.element_call(Method::Post(json!({})), &element, "/click")?;
        Ok(())
    }

    fn wait_for(&mut self, state: &WaitState, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.condition_met(state)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    waiting_for: state.to_string(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn read_text(&mut self, selector: &Selector) -> Result<String, BrowserError> {
        let element = self.find(selector)?;
        let value = self.element_call(Method::Get, &element, "/text")?;
        value
            .as_str()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| BrowserError::Protocol {
                message: format!("text of {} is not a string", selector),
            })
    }

    fn read_attribute(
        &mut self,
        selector: &Selector,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let element = self.find(selector)?;
        let value = self.element_call(Method::Get, &element, &format!("/attribute/{}", name))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client.call(Method::Delete, &self.path("")).map(|_| ())?;
        tracing::debug!(session_id = %self.session_id, "webdriver session closed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/webdriver_tests.rs"]
mod tests;
