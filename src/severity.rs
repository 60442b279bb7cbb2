//! Threshold policy for remaining data.

use crate::config::{ConfigError, ConfigSource};
use serde::Serialize;

pub const YELLOW_THRESHOLD_KEY: &str = "LOW_REMAINING_YELLOW_GB";
pub const RED_THRESHOLD_KEY: &str = "LOW_REMAINING_RED_GB";

/// Alerting tier for one account. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Normal,
    Yellow,
    Red,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "NORMAL"),
            Severity::Yellow => write!(f, "YELLOW"),
            Severity::Red => write!(f, "RED"),
        }
    }
}

/// Configured low-remaining thresholds, in gigabytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub yellow_gb: Option<f64>,
    pub red_gb: Option<f64>,
}

impl Thresholds {
    #[cfg(test)]
    pub fn new(yellow_gb: Option<f64>, red_gb: Option<f64>) -> Self {
        Self { yellow_gb, red_gb }
    }

    pub fn from_config(config: &ConfigSource) -> Result<Self, ConfigError> {
        let thresholds = Self {
            yellow_gb: config.get_f64(YELLOW_THRESHOLD_KEY)?,
            red_gb: config.get_f64(RED_THRESHOLD_KEY)?,
        };
        if let (Some(yellow), Some(red)) = (thresholds.yellow_gb, thresholds.red_gb) {
            if yellow < red {
                tracing::warn!(
                    yellow,
                    red,
                    "yellow threshold is below red; YELLOW can never be reported"
                );
            }
        }
        Ok(thresholds)
    }

    pub fn classify(&self, remaining_gb: f64) -> Severity {
        classify(remaining_gb, self.yellow_gb, self.red_gb)
    }
}

/// Maps remaining data to a severity.
///
/// Boundary values take the more severe class. A missing threshold never
/// escalates; a NaN reading compares false everywhere and stays `Normal`.
pub fn classify(remaining_gb: f64, yellow_gb: Option<f64>, red_gb: Option<f64>) -> Severity {
    if red_gb.is_some_and(|red| remaining_gb <= red) {
        Severity::Red
    } else if yellow_gb.is_some_and(|yellow| remaining_gb <= yellow) {
        Severity::Yellow
    } else {
        Severity::Normal
    }
}

#[cfg(test)]
#[path = "tests/severity_tests.rs"]
mod tests;
