use super::*;
use serial_test::serial;
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_parse_dotenv_basic_pairs() {
    let pairs = parse_dotenv("ACCOUNT1_PHONE=0123\nACCOUNT1_PASS=secret\n");
    assert_eq!(
        pairs,
        vec![
            ("ACCOUNT1_PHONE".to_string(), "0123".to_string()),
            ("ACCOUNT1_PASS".to_string(), "secret".to_string()),
        ]
    );
}

#[test]
fn test_parse_dotenv_skips_comments_and_blank_lines() {
    let content = "# accounts\n\n   \nKEY=value\n# trailing";
    let pairs = parse_dotenv(content);
    assert_eq!(pairs, vec![("KEY".to_string(), "value".to_string())]);
}

#[test]
fn test_parse_dotenv_handles_quotes_and_export() {
    let content = r#"
export SLACK_CHANNEL_ID=C123
EMAIL_PASSWORD="pa ss # not a comment"
ACCOUNT1_NAME='Main Branch'
"#;
    let pairs = parse_dotenv(content);
    assert_eq!(pairs[0], ("SLACK_CHANNEL_ID".to_string(), "C123".to_string()));
    assert_eq!(
        pairs[1],
        (
            "EMAIL_PASSWORD".to_string(),
            "pa ss # not a comment".to_string()
        )
    );
    assert_eq!(pairs[2], ("ACCOUNT1_NAME".to_string(), "Main Branch".to_string()));
}

#[test]
fn test_parse_dotenv_strips_inline_comment_on_unquoted_value() {
    let pairs = parse_dotenv("LOW_REMAINING_RED_GB=1.5 # red line");
    assert_eq!(pairs, vec![("LOW_REMAINING_RED_GB".to_string(), "1.5".to_string())]);
}

#[test]
fn test_parse_dotenv_skips_malformed_lines() {
    let pairs = parse_dotenv("no equals sign\n=value\nBAD KEY=1\nGOOD=2");
    assert_eq!(pairs, vec![("GOOD".to_string(), "2".to_string())]);
}

#[test]
fn test_blank_values_count_as_absent() {
    let source = ConfigSource::from_pairs([("EMAIL_RECIPIENT", "   "), ("EMAIL_SENDER", " a@b.c ")]);
    assert_eq!(source.get("EMAIL_RECIPIENT"), None);
    assert!(!source.contains("EMAIL_RECIPIENT"));
    assert_eq!(source.get("EMAIL_SENDER"), Some("a@b.c"));
}

#[test]
fn test_overlay_replaces_existing_values() {
    let mut base = ConfigSource::from_pairs([("A", "file"), ("B", "file")]);
    base.overlay([("B", "env")]);
    assert_eq!(base.get("A"), Some("file"));
    assert_eq!(base.get("B"), Some("env"));
}

#[test]
fn test_overlay_blank_value_clears_existing_entry() {
    let mut base = ConfigSource::from_pairs([("EMAIL_RECIPIENTS", "a@b.c,d@e.f")]);
    base.overlay([("EMAIL_RECIPIENTS", "  ")]);
    assert!(!base.contains("EMAIL_RECIPIENTS"));
}

#[test]
fn test_get_f64_parses_and_rejects() {
    let source = ConfigSource::from_pairs([
        ("LOW_REMAINING_YELLOW_GB", "5"),
        ("LOW_REMAINING_RED_GB", "one"),
        ("INF", "inf"),
    ]);
    assert_eq!(source.get_f64("LOW_REMAINING_YELLOW_GB"), Ok(Some(5.0)));
    assert_eq!(source.get_f64("MISSING"), Ok(None));
    assert_eq!(
        source.get_f64("LOW_REMAINING_RED_GB"),
        Err(ConfigError::InvalidNumber {
            key: "LOW_REMAINING_RED_GB".to_string(),
            value: "one".to_string()
        })
    );
    assert!(source.get_f64("INF").is_err());
}

#[test]
fn test_get_u16_rejects_out_of_range() {
    let source = ConfigSource::from_pairs([("EMAIL_SMTP_PORT", "70000"), ("OK", "587")]);
    assert!(source.get_u16("EMAIL_SMTP_PORT").is_err());
    assert_eq!(source.get_u16("OK"), Ok(Some(587)));
}

#[test]
fn test_config_error_messages_name_the_key() {
    let err = ConfigError::MissingAccountField {
        index: 2,
        field: "PASS",
    };
    assert_eq!(err.to_string(), "account 2 is missing ACCOUNT2_PASS");
}

#[test]
#[serial]
fn test_load_overlays_process_env_on_env_file() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("accounts.env");
    let mut file = std::fs::File::create(&env_path).unwrap();
    writeln!(file, "USAGE_REPORT_TEST_FILE_ONLY=from-file").unwrap();
    writeln!(file, "USAGE_REPORT_TEST_SHARED=from-file").unwrap();

    std::env::set_var("USAGE_REPORT_TEST_SHARED", "from-env");
    let source = ConfigSource::load(Some(&env_path)).unwrap();
    std::env::remove_var("USAGE_REPORT_TEST_SHARED");

    assert_eq!(source.get("USAGE_REPORT_TEST_FILE_ONLY"), Some("from-file"));
    assert_eq!(source.get("USAGE_REPORT_TEST_SHARED"), Some("from-env"));
}

#[test]
#[serial]
fn test_load_blank_process_env_clears_env_file_value() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("accounts.env");
    std::fs::write(&env_path, "USAGE_REPORT_TEST_CLEARED=a@b.c\n").unwrap();

    std::env::set_var("USAGE_REPORT_TEST_CLEARED", "");
    let source = ConfigSource::load(Some(&env_path)).unwrap();
    std::env::remove_var("USAGE_REPORT_TEST_CLEARED");

    assert!(!source.contains("USAGE_REPORT_TEST_CLEARED"));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_load_skips_non_utf8_process_env() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("empty.env");
    std::fs::write(&env_path, "").unwrap();

    std::env::set_var("USAGE_REPORT_TEST_BYTES", OsStr::from_bytes(&[0x66, 0xff, 0x6f]));
    std::env::set_var("USAGE_REPORT_TEST_TEXT", "plain");
    let source = ConfigSource::load(Some(&env_path));
    std::env::remove_var("USAGE_REPORT_TEST_BYTES");
    std::env::remove_var("USAGE_REPORT_TEST_TEXT");

    let source = source.unwrap();
    assert!(!source.contains("USAGE_REPORT_TEST_BYTES"));
    assert_eq!(source.get("USAGE_REPORT_TEST_TEXT"), Some("plain"));
}

#[test]
fn test_load_fails_for_missing_explicit_env_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.env");
    let err = ConfigSource::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Failed to read env file"));
}
