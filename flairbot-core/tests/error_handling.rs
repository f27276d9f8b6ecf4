use flairbot_core::{
    ConfigError, CoreError, ErrorExt, ErrorReporter, FlairError, RedditApiError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "app.app_id".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let flair_error = CoreError::Flair(FlairError::TableUnavailable {
        path: "flair_list.csv".to_string(),
        reason: "No such file or directory".to_string(),
    });
    assert_eq!(flair_error.error_code(), "FLAIR");

    let rejected = RedditApiError::FlairRejected {
        username: "coolUser123".to_string(),
        reason: "USER_DOESNT_EXIST".to_string(),
    };
    assert_eq!(rejected.error_code(), "REDDIT_FLAIR_REJECTED");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    let auth_error = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "invalid_grant".to_string(),
    });
    assert!(!auth_error.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "subject.subject".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let forbidden = CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/r/leagueofrust/api/flair".to_string(),
    });
    assert_eq!(forbidden.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::FileNotFound {
        path: "conf.toml".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("conf.toml"));

    let audit_error = CoreError::Flair(FlairError::AuditWrite {
        path: "log.txt".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    });
    assert!(audit_error.user_friendly_message().contains("log.txt"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // This test just ensures the methods don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
