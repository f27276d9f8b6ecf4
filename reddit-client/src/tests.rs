#[cfg(test)]
mod tests {
    use crate::retry::RetryConfig;
    use crate::{with_token_refresh, AuthState, RedditClient, RedditConfig, RedditToken};
    use flairbot_core::{
        AppCredentials, AuthMode, CoreError, FlairSession, RedditApiError, RetrySettings,
        Settings,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    fn create_test_config() -> RedditConfig {
        RedditConfig::new(
            "test_client_id".to_string(),
            "test_client_secret".to_string(),
            "flairbot/0.1 by test_user".to_string(),
            AuthMode::Script {
                username: "FlairBot".to_string(),
                password: "hunter2".to_string(),
            },
        )
    }

    fn token_expiring_in(offset: Duration, future: bool) -> RedditToken {
        let now = SystemTime::now();
        RedditToken {
            access_token: "access".to_string(),
            expires_at: if future { now + offset } else { now - offset },
            scope: vec!["*".to_string()],
        }
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            app: AppCredentials {
                app_id: "abc123".to_string(),
                app_secret: "s3cret".to_string(),
                user_agent: "flairbot/0.1".to_string(),
            },
            auth: AuthMode::WebApp {
                refresh_token: "refresh-me".to_string(),
            },
            subreddit: "leagueofrust".to_string(),
            subject: "Flair Request".to_string(),
            logging: true,
            retry: RetrySettings {
                max_attempts: Some(1),
                base_delay_ms: None,
            },
        };

        let config = RedditConfig::from_settings(&settings);
        assert_eq!(config.client_id, "abc123");
        assert_eq!(config.client_secret, "s3cret");
        assert_eq!(config.user_agent, "flairbot/0.1");
        assert_eq!(config.credentials, settings.auth);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.base_delay_ms, RetryConfig::reddit().base_delay_ms);
    }

    #[test]
    fn test_client_creation() {
        let client = RedditClient::new(create_test_config()).unwrap();
        assert!(!client.is_authenticated());
        assert!(!client.needs_refresh());
        assert!(matches!(
            client.get_auth_state(),
            AuthState::NotAuthenticated
        ));
    }

    #[test]
    fn test_token_expiry() {
        let client = RedditClient::new(create_test_config()).unwrap();

        client.set_token(token_expiring_in(Duration::from_secs(3600), true));
        assert!(client.is_authenticated());
        assert!(!client.needs_refresh());

        client.set_token(token_expiring_in(Duration::from_secs(3600), false));
        assert!(!client.is_authenticated());
        assert!(client.needs_refresh());
        assert!(matches!(
            client.get_auth_state(),
            AuthState::TokenExpired { .. }
        ));
    }

    #[test]
    fn test_token_inside_margin_counts_as_expired() {
        let token = token_expiring_in(Duration::from_secs(10), true);
        assert!(token.is_expired());
    }

    #[test]
    fn test_token_debug_redacts_secret() {
        let token = token_expiring_in(Duration::from_secs(3600), true);
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("access\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_ensure_authenticated_requires_login() {
        let client = RedditClient::new(create_test_config()).unwrap();

        match client.ensure_authenticated().await {
            Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })) => {
                assert!(reason.contains("Not authenticated"));
            }
            other => panic!("Expected AuthenticationFailed error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ensure_authenticated_reuses_valid_token() {
        let client = RedditClient::new(create_test_config()).unwrap();
        client.set_token(token_expiring_in(Duration::from_secs(3600), true));

        let access_token = client.ensure_authenticated().await.unwrap();
        assert_eq!(access_token, "access");
    }

    #[tokio::test]
    async fn test_session_calls_fail_before_login() {
        let client = RedditClient::new(create_test_config()).unwrap();

        assert!(client.current_user().await.is_err());
        assert!(client.unread_messages().await.is_err());
        assert!(client
            .set_flair("leagueofrust", "coolUser123", "Veteran", "23-24 season3 7")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_rate_limit_status_starts_empty() {
        let client = RedditClient::new(create_test_config()).unwrap();
        let status = client.get_rate_limit_status().await;
        assert_eq!(status.remaining, None);
    }

    #[tokio::test]
    async fn test_rejected_token_gets_one_fresh_grant() {
        let seen = Mutex::new(Vec::new());
        let grants = &AtomicU32::new(0);

        let result = with_token_refresh(
            "revoked".to_string(),
            || async move {
                grants.fetch_add(1, Ordering::SeqCst);
                Ok("fresh".to_string())
            },
            |token: String| {
                seen.lock().unwrap().push(token.clone());
                async move {
                    if token == "revoked" {
                        Err(CoreError::RedditApi(RedditApiError::InvalidToken))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(grants.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["revoked", "fresh"]);
    }

    #[tokio::test]
    async fn test_token_refresh_gives_up_after_second_rejection() {
        let grants = &AtomicU32::new(0);

        let result: Result<(), CoreError> = with_token_refresh(
            "revoked".to_string(),
            || async move {
                grants.fetch_add(1, Ordering::SeqCst);
                Ok("also-revoked".to_string())
            },
            |_token: String| async { Err(CoreError::RedditApi(RedditApiError::InvalidToken)) },
        )
        .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::InvalidToken))
        ));
        assert_eq!(grants.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_errors_skip_token_refresh() {
        let grants = &AtomicU32::new(0);

        let result: Result<(), CoreError> = with_token_refresh(
            "access".to_string(),
            || async move {
                grants.fetch_add(1, Ordering::SeqCst);
                Ok("fresh".to_string())
            },
            |_token: String| async {
                Err(CoreError::RedditApi(RedditApiError::Forbidden {
                    resource: "/r/leagueofrust/api/flair".to_string(),
                }))
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
        ));
        assert_eq!(grants.load(Ordering::SeqCst), 0);
    }
}
