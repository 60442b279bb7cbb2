use crate::scraper::webdriver::DEFAULT_WEBDRIVER_URL;
use clap::Parser;
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("USAGE_REPORT_GIT_SHA"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "usage-report")]
#[command(about = "Collects internet usage and balance for every configured account and reports it")]
#[command(version, long_version = LONG_VERSION)]
pub struct Cli {
    /// Dotenv-style settings file (default: ./.env when it exists)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// YAML portal profile overriding the built-in selectors and timeouts
    #[arg(long)]
    pub portal_config: Option<PathBuf>,

    /// Where the XLSX report is written
    #[arg(short, long, default_value = "usage_report.xlsx")]
    pub output: PathBuf,

    /// WebDriver endpoint (chromedriver, geckodriver or a Selenium grid)
    #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
    pub webdriver_url: String,

    /// Accounts scraped at the same time
    #[arg(short = 'j', long, default_value_t = 1)]
    pub concurrency: usize,

    /// Append a JSONL record of the run to this file
    #[arg(long)]
    pub event_log: Option<PathBuf>,

    /// Log notifications instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Debug-level logging (RUST_LOG still wins)
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
