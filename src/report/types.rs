//! Report data model shared by the aggregator, writer and notifiers.

use crate::accounts::AccountRef;
use crate::severity::Severity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Billing-cycle reset date as shown by the portal.
///
/// Dates in a recognized format are normalized; anything else is kept as the
/// portal printed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResetDate {
    Date(NaiveDate),
    Text(String),
}

impl std::fmt::Display for ResetDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetDate::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ResetDate::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Usage scraped for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub account: AccountRef,
    pub balance: f64,
    pub currency: String,
    pub quota_gb: f64,
    pub consumed_gb: f64,
    pub remaining_gb: f64,
    pub renewal_cost: Option<f64>,
    pub reset_date: Option<ResetDate>,
    pub scraped_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Balance with the portal's currency label, e.g. `87.25 EGP`.
    pub fn balance_label(&self) -> String {
        format!("{} {}", format_amount(self.balance), self.currency)
    }

    pub fn renewal_cost_label(&self) -> Option<String> {
        self.renewal_cost
            .map(|cost| format!("{} {}", format_amount(cost), self.currency))
    }
}

/// Two decimals, with whole amounts printed without them.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Why a scrape did not produce a usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScrapeErrorKind {
    /// The portal rejected the credentials.
    AuthenticationFailure,
    /// The portal or driver did not respond in time.
    NavigationTimeout,
    /// The dashboard loaded but expected fields were missing or malformed.
    ParseFailure,
}

impl std::fmt::Display for ScrapeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeErrorKind::AuthenticationFailure => write!(f, "AuthenticationFailure"),
            ScrapeErrorKind::NavigationTimeout => write!(f, "NavigationTimeout"),
            ScrapeErrorKind::ParseFailure => write!(f, "ParseFailure"),
        }
    }
}

/// A failed scrape, recorded in place of a usage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeFailure {
    pub account: AccountRef,
    pub kind: ScrapeErrorKind,
    pub message: String,
}

impl std::fmt::Display for ScrapeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one account's session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Usage(UsageRecord),
    Failure(ScrapeFailure),
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub outcome: RowOutcome,
    pub severity: Severity,
}

impl ReportRow {
    pub fn account(&self) -> &AccountRef {
        match &self.outcome {
            RowOutcome::Usage(record) => &record.account,
            RowOutcome::Failure(failure) => &failure.account,
        }
    }

    #[cfg(test)]
    pub fn usage(&self) -> Option<&UsageRecord> {
        match &self.outcome {
            RowOutcome::Usage(record) => Some(record),
            RowOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScrapeFailure> {
        match &self.outcome {
            RowOutcome::Usage(_) => None,
            RowOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Rows for every configured account, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    rows: Vec<ReportRow>,
}

impl AggregateResult {
    pub fn new(rows: Vec<ReportRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.rows.iter().filter(|row| row.failure().is_some()).count()
    }

    /// Most severe classification across successful rows.
    pub fn worst_severity(&self) -> Severity {
        self.rows
            .iter()
            .map(|row| row.severity)
            .max()
            .unwrap_or_default()
    }
}
