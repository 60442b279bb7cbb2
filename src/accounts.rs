//! Account registry: numbered `ACCOUNTn_*` entries into typed descriptors.

use crate::config::{ConfigError, ConfigSource};
use serde::Serialize;
use std::collections::BTreeSet;

/// Upper bound of the index scan.
pub const MAX_ACCOUNTS: usize = 99;

/// Account type selected on the portal login form when none is configured.
pub const DEFAULT_ACCOUNT_TYPE: &str = "Internet";

const FIELD_PHONE: &str = "PHONE";
const FIELD_PASS: &str = "PASS";
const FIELD_TYPE: &str = "TYPE";
const FIELD_NAME: &str = "NAME";
const FIELDS: [&str; 4] = [FIELD_PHONE, FIELD_PASS, FIELD_TYPE, FIELD_NAME];

/// One configured portal account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountDescriptor {
    /// 1-based position in the configuration.
    pub index: usize,
    pub phone: String,
    pub password: String,
    pub account_type: String,
    pub name: Option<String>,
}

impl AccountDescriptor {
    /// Friendly name, falling back to `Account n`.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Account {}", self.index))
    }

    /// Secret-free reference carried by report rows.
    pub fn reference(&self) -> AccountRef {
        AccountRef {
            index: self.index,
            name: self.display_name(),
            number: self.phone.clone(),
            account_type: self.account_type.clone(),
        }
    }
}

impl std::fmt::Debug for AccountDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDescriptor")
            .field("index", &self.index)
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .field("account_type", &self.account_type)
            .field("name", &self.name)
            .finish()
    }
}

/// Identifies an account in results without carrying its credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRef {
    pub index: usize,
    pub name: String,
    pub number: String,
    pub account_type: String,
}

fn account_key(index: usize, field: &str) -> String {
    format!("ACCOUNT{}_{}", index, field)
}

fn is_referenced(config: &ConfigSource, index: usize) -> bool {
    FIELDS
        .iter()
        .any(|field| config.contains(&account_key(index, field)))
}

/// Reads accounts 1, 2, ... until the first index with no keys at all.
///
/// A referenced index without `PHONE` or `PASS` is a configuration error;
/// nothing after the first gap is ever loaded.
pub fn load_accounts(config: &ConfigSource) -> Result<Vec<AccountDescriptor>, ConfigError> {
    let mut accounts = Vec::new();

    for index in 1..=MAX_ACCOUNTS {
        if !is_referenced(config, index) {
            warn_on_orphans(config, index);
            break;
        }

        let required = |field: &'static str| {
            config
                .get(&account_key(index, field))
                .map(str::to_string)
                .ok_or(ConfigError::MissingAccountField { index, field })
        };

        let phone = required(FIELD_PHONE)?;
        let password = required(FIELD_PASS)?;
        let account_type = config
            .get(&account_key(index, FIELD_TYPE))
            .unwrap_or(DEFAULT_ACCOUNT_TYPE)
            .to_string();
        let name = config
            .get(&account_key(index, FIELD_NAME))
            .map(str::to_string);

        accounts.push(AccountDescriptor {
            index,
            phone,
            password,
            account_type,
            name,
        });
    }

    tracing::debug!(count = accounts.len(), "account registry loaded");
    Ok(accounts)
}

/// Account indices referenced by any `ACCOUNTn_<FIELD>` key.
pub fn referenced_indices(config: &ConfigSource) -> BTreeSet<usize> {
    config
        .keys()
        .filter_map(|key| {
            let rest = key.strip_prefix("ACCOUNT")?;
            let (digits, field) = rest.split_once('_')?;
            if !FIELDS.contains(&field) || digits.is_empty() {
                return None;
            }
            digits.parse::<usize>().ok()
        })
        .collect()
}

fn warn_on_orphans(config: &ConfigSource, gap: usize) {
    let orphans: Vec<usize> = referenced_indices(config)
        .into_iter()
        .filter(|index| *index > gap)
        .collect();
    if !orphans.is_empty() {
        tracing::warn!(
            gap,
            ?orphans,
            "accounts after a numbering gap are ignored; renumber them contiguously"
        );
    }
}

#[cfg(test)]
#[path = "tests/accounts_tests.rs"]
mod tests;
