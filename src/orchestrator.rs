//! Run orchestration: registry, scrape, report, notify.

use crate::accounts::{load_accounts, AccountDescriptor};
use crate::cli::Cli;
use crate::config::ConfigSource;
use crate::notify::settings::ChannelSettings;
use crate::notify::{ChannelOutcome, Channels, Dispatcher};
use crate::report::types::AggregateResult;
use crate::report::{write_report, Aggregator};
use crate::run_log::RunEventLog;
use crate::scraper::portal::PortalProfile;
use crate::scraper::webdriver::{WebDriverBrowser, WebDriverOptions};
use crate::scraper::SessionScraper;
use crate::severity::Thresholds;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Configured,
    Scraping,
    Aggregated,
    ReportWritten,
    Notified,
    Done,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunState::Configured => "CONFIGURED",
            RunState::Scraping => "SCRAPING",
            RunState::Aggregated => "AGGREGATED",
            RunState::ReportWritten => "REPORT_WRITTEN",
            RunState::Notified => "NOTIFIED",
            RunState::Done => "DONE",
            RunState::Aborted => "ABORTED",
        };
        write!(f, "{}", label)
    }
}

impl RunState {
    /// Abort is only reachable before any account has been scraped.
    pub fn can_advance(self, to: RunState) -> bool {
        matches!(
            (self, to),
            (RunState::Configured, RunState::Scraping)
                | (RunState::Scraping, RunState::Aggregated)
                | (RunState::Aggregated, RunState::ReportWritten)
                | (RunState::ReportWritten, RunState::Notified)
                | (RunState::Notified, RunState::Done)
                | (RunState::Configured, RunState::Aborted)
                | (RunState::Scraping, RunState::Aborted)
        )
    }
}

/// Current run state; every transition is validated and logged.
pub struct RunTracker {
    state: RunState,
    log: Arc<RunEventLog>,
}

impl RunTracker {
    pub fn new(log: Arc<RunEventLog>) -> Self {
        Self {
            state: RunState::Configured,
            log,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, to: RunState) -> Result<()> {
        if !self.state.can_advance(to) {
            anyhow::bail!("Invalid run state transition from {} to {}", self.state, to);
        }
        tracing::debug!(from = %self.state, to = %to, "run state");
        self.log
            .log_transition(&self.state.to_string(), &to.to_string());
        self.state = to;
        Ok(())
    }

    /// Moves to ABORTED and records why.
    pub fn abort(&mut self, reason: &str) -> Result<()> {
        self.advance(RunState::Aborted)?;
        tracing::error!("run aborted: {}", reason);
        self.log.log_finished(&self.state.to_string(), 0);
        Ok(())
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub state: RunState,
    pub result: Arc<AggregateResult>,
    pub report_path: Option<PathBuf>,
    pub report_error: Option<String>,
    pub notifications: Vec<ChannelOutcome>,
}

pub struct Pipeline {
    aggregator: Aggregator,
    dispatcher: Dispatcher,
    output: PathBuf,
    log: Arc<RunEventLog>,
}

impl Pipeline {
    pub fn new(
        aggregator: Aggregator,
        dispatcher: Dispatcher,
        output: PathBuf,
        log: Arc<RunEventLog>,
    ) -> Self {
        Self {
            aggregator,
            dispatcher,
            output,
            log,
        }
    }

    /// Scrapes, writes the report and notifies.
    ///
    /// Only an aggregator error aborts; report and channel failures are
    /// recorded in the summary and the run still reaches DONE.
    pub async fn run(&self, accounts: &[AccountDescriptor]) -> Result<RunSummary> {
        let mut tracker = RunTracker::new(Arc::clone(&self.log));
        tracker.advance(RunState::Scraping)?;

        let result = match self.aggregator.aggregate(accounts).await {
            Ok(result) => Arc::new(result),
            Err(e) => {
                tracker.abort(&e.to_string())?;
                return Err(anyhow::Error::new(e).context("Run aborted before scraping"));
            }
        };
        for row in result.rows() {
            self.log.log_account(row);
        }
        tracker.advance(RunState::Aggregated)?;

        let (report_path, report_error) = self.write(Arc::clone(&result)).await;
        self.log
            .log_report(report_path.as_deref(), report_error.as_deref());
        tracker.advance(RunState::ReportWritten)?;

        let notifications = self
            .dispatcher
            .notify(&result, report_path.as_deref())
            .await;
        for outcome in &notifications {
            self.log.log_channel(outcome);
        }
        tracker.advance(RunState::Notified)?;

        tracker.advance(RunState::Done)?;
        self.log
            .log_finished(&tracker.state().to_string(), result.failure_count());

        Ok(RunSummary {
            run_id: self.log.run_id().to_string(),
            state: tracker.state(),
            result,
            report_path,
            report_error,
            notifications,
        })
    }

    async fn write(&self, result: Arc<AggregateResult>) -> (Option<PathBuf>, Option<String>) {
        let output = self.output.clone();
        let written = tokio::task::spawn_blocking(move || write_report(&result, &output))
            .await
            .map_err(|e| format!("report task aborted: {}", e))
            .and_then(|written| written.map_err(|e| e.to_string()));

        match written {
            Ok(path) => (Some(path), None),
            Err(message) => {
                tracing::error!("report not written: {}", message);
                (None, Some(message))
            }
        }
    }
}

/// Builds every component from the command line and configuration.
fn prepare(cli: &Cli, log: Arc<RunEventLog>) -> Result<(Vec<AccountDescriptor>, Pipeline)> {
    let config = ConfigSource::load(cli.env_file.as_deref())?;
    let accounts = load_accounts(&config).context("Invalid account configuration")?;
    let thresholds =
        Thresholds::from_config(&config).context("Invalid threshold configuration")?;
    let profile = PortalProfile::resolve(cli.portal_config.as_deref())?;

    let browser = WebDriverBrowser::new(WebDriverOptions {
        url: cli.webdriver_url.clone(),
        page_load_timeout: profile.timeouts.navigation(),
        ..WebDriverOptions::default()
    });
    let scraper = Arc::new(SessionScraper::new(Arc::new(browser), profile));
    let aggregator = Aggregator::new(scraper, thresholds, cli.concurrency);

    let settings =
        ChannelSettings::from_config(&config).context("Invalid notification configuration")?;
    let channels = Channels::from_settings(&settings, cli.dry_run)
        .context("Failed to set up notification transports")?;

    let dispatcher = Dispatcher::new(channels);

    tracing::info!(
        accounts = accounts.len(),
        channels = ?dispatcher.channels().enabled(),
        dry_run = cli.dry_run,
        "configuration loaded"
    );
    let pipeline = Pipeline::new(aggregator, dispatcher, cli.output.clone(), log);
    Ok((accounts, pipeline))
}

/// Runs one report. Errors mean the run was aborted.
pub async fn run(cli: &Cli) -> Result<RunSummary> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let log = Arc::new(match &cli.event_log {
        Some(path) => RunEventLog::create(&run_id, path)?,
        None => RunEventLog::disabled(&run_id),
    });
    tracing::info!(%run_id, event_log = ?log.path(), "run started");

    let (accounts, pipeline) = match prepare(cli, Arc::clone(&log)) {
        Ok(prepared) => prepared,
        Err(e) => {
            RunTracker::new(log).abort(&format!("{:#}", e))?;
            return Err(e);
        }
    };
    pipeline.run(&accounts).await
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
