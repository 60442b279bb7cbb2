//! Message bodies for the notification channels.

use super::{EmailMessage, SlackMessage};
use crate::report::types::{format_amount, AggregateResult, ReportRow, RowOutcome};
use crate::severity::Severity;
use chrono::NaiveDate;
use std::path::Path;

pub const EMAIL_SUBJECT: &str = "Usage & Balance Report";
pub const EMAIL_INTRO: &str = "Please find today's usage report attached.";
pub const EMAIL_NO_ATTACHMENT: &str =
    "The report file could not be written for this run; the summary is below.";

pub fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => ":large_green_circle:",
        Severity::Yellow => ":large_yellow_circle:",
        Severity::Red => ":red_circle:",
    }
}

/// One-line summary of a row, shared by both channels.
pub fn row_summary(row: &ReportRow) -> String {
    let account = row.account();
    match &row.outcome {
        RowOutcome::Usage(record) => {
            let reset = record
                .reset_date
                .as_ref()
                .map_or_else(|| "n/a".to_string(), |date| date.to_string());
            format!(
                "{} ({}): {} / {} GB remaining, balance {}, resets {} [{}]",
                account.name,
                account.number,
                format_amount(record.remaining_gb),
                format_amount(record.quota_gb),
                record.balance_label(),
                reset,
                row.severity
            )
        }
        RowOutcome::Failure(failure) => {
            format!("{} ({}): FAILED {}", account.name, account.number, failure)
        }
    }
}

fn headline(result: &AggregateResult, run_date: NaiveDate) -> String {
    format!(
        "Usage report {}: {} account(s), {} failed",
        run_date.format("%Y-%m-%d"),
        result.len(),
        result.failure_count()
    )
}

/// Escapes the control characters of Slack message text.
fn escape_slack(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn slack_message(channel_id: &str, result: &AggregateResult, run_date: NaiveDate) -> SlackMessage {
    let mut lines = vec![format!(
        "{} *{}*",
        severity_marker(result.worst_severity()),
        headline(result, run_date)
    )];
    lines.extend(
        result
            .rows()
            .iter()
            .map(|row| format!("• {}", escape_slack(&row_summary(row)))),
    );
    SlackMessage {
        channel: channel_id.to_string(),
        text: lines.join("\n"),
    }
}

/// Email with the report attached, or a note that the file is missing.
pub fn email_message(
    sender: &str,
    recipients: &[String],
    result: &AggregateResult,
    report_path: Option<&Path>,
    run_date: NaiveDate,
) -> EmailMessage {
    let mut body = String::from(if report_path.is_some() {
        EMAIL_INTRO
    } else {
        EMAIL_NO_ATTACHMENT
    });
    body.push_str("\n\n");
    body.push_str(&headline(result, run_date));
    body.push('\n');
    for row in result.rows() {
        body.push_str("- ");
        body.push_str(&row_summary(row));
        body.push('\n');
    }

    EmailMessage {
        sender: sender.to_string(),
        recipients: recipients.to_vec(),
        subject: EMAIL_SUBJECT.to_string(),
        body,
        attachment: report_path.map(Path::to_path_buf),
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
