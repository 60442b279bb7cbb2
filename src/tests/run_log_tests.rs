use super::*;
use crate::notify::{Channel, NotificationFailure};
use tempfile::TempDir;

fn create_test_log() -> (RunEventLog, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = RunEventLog::create("run-1", &temp_dir.path().join("logs").join("events.jsonl"))
        .expect("Failed to create event log");
    (log, temp_dir)
}

fn read_events(temp_dir: &TempDir) -> Vec<RunEvent> {
    let content = std::fs::read_to_string(temp_dir.path().join("logs").join("events.jsonl"))
        .expect("Failed to read event log");
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("Failed to parse event"))
        .collect()
}

#[test]
fn test_sequence_numbers_monotonic() {
    let (log, temp_dir) = create_test_log();

    for i in 0..10 {
        log.log("Test", serde_json::json!({"iteration": i}));
    }

    let events = read_events(&temp_dir);
    assert_eq!(events.len(), 10);
    let mut prev_seq = 0u64;
    for event in &events {
        assert!(event.seq > prev_seq);
        assert_eq!(event.run_id, "run-1");
        prev_seq = event.seq;
    }
}

#[test]
fn test_timestamp_format() {
    let (log, temp_dir) = create_test_log();

    log.log_transition("CONFIGURED", "SCRAPING");

    let event = &read_events(&temp_dir)[0];
    assert!(event.ts.contains('T'));
    assert!(event.ts.ends_with('Z'));
    let micros_part = event.ts.split('.').nth(1).unwrap();
    assert_eq!(micros_part.len(), 7);
    assert_eq!(event.component, "Run");
    assert_eq!(event.event["from"], "CONFIGURED");
    assert_eq!(event.event["to"], "SCRAPING");
}

#[test]
fn test_report_and_channel_events() {
    let (log, temp_dir) = create_test_log();

    log.log_report(None, Some("cannot write report"));
    log.log_channel(&ChannelOutcome::Failed(NotificationFailure {
        channel: Channel::Slack,
        message: "rejected: invalid_auth".to_string(),
    }));
    log.log_finished("DONE", 1);

    let events = read_events(&temp_dir);
    assert_eq!(events[0].event["type"], "ReportWritten");
    assert!(events[0].event["path"].is_null());
    assert_eq!(events[1].event["outcome"]["status"], "failed");
    assert_eq!(events[1].event["outcome"]["channel"], "slack");
    assert_eq!(events[2].event["account_failures"], 1);
}

#[test]
fn test_concurrent_logging() {
    use std::sync::Arc;
    use std::thread;

    let (log, temp_dir) = create_test_log();
    let log = Arc::new(log);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..25 {
                    log.log("Thread", serde_json::json!({"thread": t, "iteration": i}));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(read_events(&temp_dir).len(), 100);
}

#[test]
fn test_disabled_log_writes_nothing() {
    let log = RunEventLog::disabled("run-2");
    log.log_finished("DONE", 0);
    assert!(log.path().is_none());
    assert_eq!(log.run_id(), "run-2");
}
