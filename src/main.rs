mod accounts;
mod cli;
mod config;
mod notify;
mod orchestrator;
mod report;
mod run_log;
mod scraper;
mod severity;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let summary = orchestrator::run(&cli).await?;

    let sent = summary.notifications.iter().filter(|n| n.is_sent()).count();
    tracing::info!(
        run_id = %summary.run_id,
        state = %summary.state,
        accounts = summary.result.len(),
        failures = summary.result.failure_count(),
        report = ?summary.report_path,
        notifications_sent = sent,
        notifications_failed = summary.notifications.len() - sent,
        "run finished"
    );
    if let Some(error) = &summary.report_error {
        tracing::warn!("report file unavailable: {}", error);
    }
    Ok(())
}
