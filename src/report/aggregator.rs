//! Runs the scraper over every account and classifies the results.

use crate::accounts::AccountDescriptor;
use crate::report::types::{
    AggregateResult, ReportRow, RowOutcome, ScrapeErrorKind, ScrapeFailure, UsageRecord,
};
use crate::scraper::SessionScraper;
use crate::severity::{Severity, Thresholds};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The registry produced no accounts.
    NoAccounts,
    /// The browser backend could not be reached before the first account.
    BrowserUnavailable(String),
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::NoAccounts => write!(f, "no accounts configured"),
            AggregateError::BrowserUnavailable(message) => {
                write!(f, "browser automation unavailable: {}", message)
            }
        }
    }
}

impl std::error::Error for AggregateError {}

pub struct Aggregator {
    scraper: Arc<SessionScraper>,
    thresholds: Thresholds,
    concurrency: usize,
}

impl Aggregator {
    /// `concurrency` is the number of browser sessions allowed at once; 0 is treated as 1.
    pub fn new(scraper: Arc<SessionScraper>, thresholds: Thresholds, concurrency: usize) -> Self {
        Self {
            scraper,
            thresholds,
            concurrency: concurrency.max(1),
        }
    }

    /// Scrapes every account and returns one row per account, in registry order.
    pub async fn aggregate(
        &self,
        accounts: &[AccountDescriptor],
    ) -> Result<AggregateResult, AggregateError> {
        if accounts.is_empty() {
            return Err(AggregateError::NoAccounts);
        }

        let probe = Arc::clone(&self.scraper);
        tokio::task::spawn_blocking(move || probe.ensure_available())
            .await
            .map_err(|e| AggregateError::BrowserUnavailable(format!("probe aborted: {}", e)))?
            .map_err(|e| AggregateError::BrowserUnavailable(e.to_string()))?;

        tracing::info!(
            accounts = accounts.len(),
            concurrency = self.concurrency,
            "starting scrape"
        );

        let mut rows: Vec<(usize, ReportRow)> = stream::iter(accounts.iter().cloned().enumerate())
            .map(|(position, account)| {
                let scraper = Arc::clone(&self.scraper);
                let thresholds = self.thresholds;
                async move {
                    let reference = account.reference();
                    let outcome = tokio::task::spawn_blocking(move || scraper.scrape(&account))
                        .await
                        .unwrap_or_else(|e| {
                            tracing::error!(account = reference.index, "scrape task aborted: {}", e);
                            Err(ScrapeFailure {
                                account: reference,
                                kind: ScrapeErrorKind::NavigationTimeout,
                                message: format!("scrape task aborted: {}", e),
                            })
                        });
                    (position, classify_outcome(outcome, &thresholds))
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Completion order is arbitrary once sessions overlap.
        rows.sort_by_key(|(position, _)| *position);
        let result = AggregateResult::new(rows.into_iter().map(|(_, row)| row).collect());

        tracing::info!(
            rows = result.len(),
            failures = result.failure_count(),
            worst = %result.worst_severity(),
            "scrape finished"
        );
        Ok(result)
    }
}

/// Turns a scrape outcome into a report row. Failed rows stay `Normal`.
pub fn classify_outcome(
    outcome: Result<UsageRecord, ScrapeFailure>,
    thresholds: &Thresholds,
) -> ReportRow {
    match outcome {
        Ok(record) => ReportRow {
            severity: thresholds.classify(record.remaining_gb),
            outcome: RowOutcome::Usage(record),
        },
        Err(failure) => ReportRow {
            severity: Severity::Normal,
            outcome: RowOutcome::Failure(failure),
        },
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
