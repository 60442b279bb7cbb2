//! Pre-resolved key/value configuration.
//!
//! The run reads its settings from a flat mapping built once at startup:
//! an optional dotenv-style file overlaid by the process environment.
//! Every other component receives a `&ConfigSource` and never touches
//! `std::env` directly.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default dotenv file looked up in the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Errors raised while interpreting configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A referenced account block lacks a mandatory field.
    MissingAccountField { index: usize, field: &'static str },
    /// A numeric setting could not be parsed.
    InvalidNumber { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingAccountField { index, field } => write!(
                f,
                "account {} is missing ACCOUNT{}_{}",
                index, index, field
            ),
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{} must be a number, got '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Flat configuration mapping with trimmed, non-empty values.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    values: BTreeMap<String, String>,
}

impl ConfigSource {
    /// Builds a source from explicit pairs. Later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut source = Self::default();
        source.overlay(pairs);
        source
    }

    /// Loads the run configuration.
    ///
    /// An explicit `env_file` must exist. Without one, `.env` in the working
    /// directory is used when present. Process environment always wins over
    /// file entries; a blank variable clears the file's value.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let file_path: Option<PathBuf> = match env_file {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_ENV_FILE);
                default.exists().then_some(default)
            }
        };

        let mut source = match &file_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read env file: {}", path.display()))?;
                tracing::debug!(path = %path.display(), "loaded env file");
                Self::from_pairs(parse_dotenv(&content))
            }
            None => Self::default(),
        };

        source.overlay(env_vars());
        Ok(source)
    }

    /// Applies `pairs` over this source. Blank values remove the key.
    pub fn overlay<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.insert(key.into(), value.into());
        }
    }

    fn insert(&mut self, key: String, value: String) {
        let value = value.trim();
        if value.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value.to_string());
        }
    }

    /// Returns the value for `key`, if set to something non-blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns `true` when `key` holds a non-blank value.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All keys in lexical order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Parses an optional floating point setting.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ConfigError::InvalidNumber {
                        key: key.to_string(),
                        value: raw.to_string(),
                    })
            })
            .transpose()
    }

    /// Parses an optional port-sized integer setting.
    pub fn get_u16(&self, key: &str) -> Result<Option<u16>, ConfigError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                    key: key.to_string(),
                    value: raw.to_string(),
                })
            })
            .transpose()
    }
}

/// Parses dotenv-style content into key/value pairs.
///
/// Supports `KEY=value`, an optional `export ` prefix, `#` comment lines,
/// single or double quoted values, and trailing ` #` comments on unquoted
/// values. Malformed lines are skipped.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            continue;
        }

        pairs.push((key.to_string(), unquote(raw_value.trim())));
    }

    pairs
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.split_once(quote))
            .map(|(inner, _)| inner)
        {
            return inner.to_string();
        }
    }

    match value.find(" #") {
        Some(pos) => value.get(..pos).unwrap_or(value).trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Process environment entries that are valid Unicode.
fn env_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(key, value)| match key.into_string() {
        Ok(key) => match value.into_string() {
            Ok(value) => Some((key, value)),
            Err(_) => {
                tracing::debug!(%key, "skipping environment variable with non-UTF-8 value");
                None
            }
        },
        Err(key) => {
            tracing::debug!(
                key = %key.to_string_lossy(),
                "skipping non-UTF-8 environment variable"
            );
            None
        }
    })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
