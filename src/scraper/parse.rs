//! Text normalization for values read off the dashboard.

use crate::report::types::ResetDate;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

const NUMBER_PATTERN: &str = r"-?\d[\d,]*(?:\.\d+)?";

fn number_regex() -> Option<&'static Regex> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(NUMBER_PATTERN).ok()).as_ref()
}

/// First number in `text`, with thousands separators and unit text dropped.
///
/// `"1,234.50 EGP"` reads as `1234.5`, `"15.5 GB"` as `15.5`.
pub fn parse_number(text: &str) -> Option<f64> {
    let found = number_regex()?.find(text)?;
    found
        .as_str()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Date portion of a label like `Renewal Date: 12-05-2025, 10:00 AM`.
pub fn extract_reset_date(text: &str) -> Option<&str> {
    let after_label = text.split_once(':').map_or(text, |(_, rest)| rest);
    let value = after_label.split(',').next().unwrap_or_default().trim();
    (!value.is_empty()).then_some(value)
}

/// Parses with the first matching format, else keeps the text as shown.
pub fn parse_reset_date(raw: &str, formats: &[String]) -> ResetDate {
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map_or_else(|| ResetDate::Text(raw.to_string()), ResetDate::Date)
}

#[cfg(test)]
#[path = "tests/parse_tests.rs"]
mod tests;
