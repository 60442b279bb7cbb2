use super::*;
use proptest::prelude::*;

#[test]
fn test_boundary_equal_to_red_is_red() {
    assert_eq!(classify(1.0, Some(5.0), Some(1.0)), Severity::Red);
}

#[test]
fn test_just_above_red_is_yellow() {
    assert_eq!(classify(1.0001, Some(5.0), Some(1.0)), Severity::Yellow);
}

#[test]
fn test_boundary_equal_to_yellow_is_yellow() {
    assert_eq!(classify(5.0, Some(5.0), Some(1.0)), Severity::Yellow);
}

#[test]
fn test_above_yellow_is_normal() {
    assert_eq!(classify(5.5, Some(5.0), Some(1.0)), Severity::Normal);
}

#[test]
fn test_single_threshold_only() {
    assert_eq!(classify(0.5, None, Some(1.0)), Severity::Red);
    assert_eq!(classify(3.0, None, Some(1.0)), Severity::Normal);
    assert_eq!(classify(3.0, Some(5.0), None), Severity::Yellow);
    assert_eq!(classify(0.0, Some(5.0), None), Severity::Yellow);
}

#[test]
fn test_inverted_thresholds_never_yield_yellow() {
    // yellow < red: red wins below it, nothing in between escalates.
    assert_eq!(classify(0.5, Some(1.0), Some(5.0)), Severity::Red);
    assert_eq!(classify(3.0, Some(1.0), Some(5.0)), Severity::Red);
    assert_eq!(classify(6.0, Some(1.0), Some(5.0)), Severity::Normal);
}

#[test]
fn test_nan_is_normal() {
    assert_eq!(classify(f64::NAN, Some(5.0), Some(1.0)), Severity::Normal);
}

#[test]
fn test_severity_ordering_and_display() {
    assert!(Severity::Red > Severity::Yellow);
    assert!(Severity::Yellow > Severity::Normal);
    assert_eq!(Severity::Yellow.to_string(), "YELLOW");
    assert_eq!(
        serde_json::to_string(&Severity::Red).unwrap(),
        "\"RED\""
    );
}

#[test]
fn test_thresholds_from_config() {
    let config = ConfigSource::from_pairs([
        (YELLOW_THRESHOLD_KEY, "5"),
        (RED_THRESHOLD_KEY, "1.5"),
    ]);
    let thresholds = Thresholds::from_config(&config).unwrap();
    assert_eq!(thresholds, Thresholds::new(Some(5.0), Some(1.5)));
    assert_eq!(thresholds.classify(3.0), Severity::Yellow);
}

#[test]
fn test_thresholds_absent_from_config() {
    let thresholds = Thresholds::from_config(&ConfigSource::default()).unwrap();
    assert_eq!(thresholds, Thresholds::default());
}

#[test]
fn test_thresholds_reject_garbage() {
    let config = ConfigSource::from_pairs([(RED_THRESHOLD_KEY, "low")]);
    assert!(matches!(
        Thresholds::from_config(&config),
        Err(ConfigError::InvalidNumber { .. })
    ));
}

proptest! {
    #[test]
    fn prop_no_thresholds_is_always_normal(remaining in -1.0e6f64..1.0e6) {
        prop_assert_eq!(classify(remaining, None, None), Severity::Normal);
    }

    #[test]
    fn prop_severity_never_decreases_as_remaining_drops(
        red in 0.0f64..50.0,
        gap in 0.0f64..50.0,
        a in 0.0f64..200.0,
        b in 0.0f64..200.0,
    ) {
        let yellow = red + gap;
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            classify(low, Some(yellow), Some(red)) >= classify(high, Some(yellow), Some(red))
        );
    }
}
