use super::*;

#[test]
fn test_ok_response_is_success() {
    assert_eq!(interpret_response(200, r#"{"ok": true, "ts": "1.2"}"#), Ok(()));
}

#[test]
fn test_ok_false_is_rejected_with_slack_error() {
    assert_eq!(
        interpret_response(200, r#"{"ok": false, "error": "channel_not_found"}"#),
        Err(NotifyError::Rejected("channel_not_found".to_string()))
    );
    assert_eq!(
        interpret_response(200, r#"{"ok": false}"#),
        Err(NotifyError::Rejected("unknown error".to_string()))
    );
}

#[test]
fn test_http_error_and_garbage_are_rejected() {
    assert_eq!(
        interpret_response(429, r#"{"ok": false, "error": "ratelimited"}"#),
        Err(NotifyError::Rejected("HTTP 429".to_string()))
    );
    assert!(matches!(
        interpret_response(200, "<html>"),
        Err(NotifyError::Rejected(_))
    ));
}

#[test]
fn test_unreachable_endpoint_is_transport_error() {
    let api = SlackApi::new("xoxb-test").with_endpoint("http://127.0.0.1:9/api/chat.postMessage");
    let message = SlackMessage {
        channel: "C01".to_string(),
        text: "hello".to_string(),
    };
    assert!(matches!(
        api.post_message(&message),
        Err(NotifyError::Transport(_))
    ));
}
