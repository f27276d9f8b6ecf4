//! Run settings loaded once at startup from the bot's TOML settings file.
//!
//! Every key is required. A missing or malformed key fails the run instead of
//! falling back to a default, since running with the wrong credentials or the
//! wrong subreddit is worse than not running at all.

use crate::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
    pub user_agent: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// How the bot account signs in.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Script app: account username and password.
    Script { username: String, password: String },
    /// Web app: a permanent refresh token obtained out of band.
    WebApp { refresh_token: String },
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Script { .. } => "script",
            AuthMode::WebApp { .. } => "webapp",
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Script { username, .. } => f
                .debug_struct("Script")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthMode::WebApp { .. } => f
                .debug_struct("WebApp")
                .field("refresh_token", &"<redacted>")
                .finish(),
        }
    }
}

/// Optional tuning for retries around remote calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppCredentials,
    pub auth: AuthMode,
    pub subreddit: String,
    pub subject: String,
    pub logging: bool,
    pub retry: RetrySettings,
}

#[derive(Deserialize)]
struct RawSettings {
    app: RawApp,
    #[serde(rename = "auth-script")]
    auth_script: Option<RawAuthScript>,
    #[serde(rename = "auth-webapp")]
    auth_webapp: Option<RawAuthWebApp>,
    subreddit: RawSubreddit,
    subject: RawSubject,
    log: RawLog,
    #[serde(default)]
    retry: RetrySettings,
}

#[derive(Deserialize)]
struct RawApp {
    app_id: String,
    app_secret: String,
    user_agent: String,
    auth_type: String,
}

#[derive(Deserialize)]
struct RawAuthScript {
    username: String,
    passwd: String,
}

#[derive(Deserialize)]
struct RawAuthWebApp {
    token: String,
}

#[derive(Deserialize)]
struct RawSubreddit {
    name: String,
}

#[derive(Deserialize)]
struct RawSubject {
    subject: String,
}

#[derive(Deserialize)]
struct RawLog {
    logging: bool,
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        debug!(
            "Loaded settings from {} (auth mode: {})",
            path.display(),
            settings.auth.as_str()
        );
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(content)?;

        let auth = match raw.app.auth_type.as_str() {
            "script" => {
                let section = raw.auth_script.ok_or_else(|| missing("auth-script"))?;
                AuthMode::Script {
                    username: required("auth-script.username", section.username)?,
                    password: required("auth-script.passwd", section.passwd)?,
                }
            }
            "webapp" => {
                let section = raw.auth_webapp.ok_or_else(|| missing("auth-webapp"))?;
                AuthMode::WebApp {
                    refresh_token: required("auth-webapp.token", section.token)?,
                }
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "app.auth_type".to_string(),
                    value: other.to_string(),
                })
            }
        };

        if raw.retry.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            app: AppCredentials {
                app_id: required("app.app_id", raw.app.app_id)?,
                app_secret: required("app.app_secret", raw.app.app_secret)?,
                user_agent: required("app.user_agent", raw.app.user_agent)?,
            },
            auth,
            subreddit: required("subreddit.name", raw.subreddit.name)?,
            subject: raw.subject.subject,
            logging: raw.log.logging,
            retry: raw.retry,
        })
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.to_string(),
    }
}

fn required(field: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(missing(field))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCRIPT_SETTINGS: &str = r#"
[app]
app_id = "abc123"
app_secret = "s3cret"
user_agent = "flairbot/0.1 by modteam"
auth_type = "script"

[auth-script]
username = "FlairBot"
passwd = "hunter2"

[subreddit]
name = "leagueofrust"

[subject]
subject = "Flair Request"

[log]
logging = true
"#;

    #[test]
    fn test_script_settings() {
        let settings = Settings::from_toml_str(SCRIPT_SETTINGS).unwrap();
        assert_eq!(settings.app.app_id, "abc123");
        assert_eq!(settings.subreddit, "leagueofrust");
        assert_eq!(settings.subject, "Flair Request");
        assert!(settings.logging);
        assert_eq!(
            settings.auth,
            AuthMode::Script {
                username: "FlairBot".to_string(),
                password: "hunter2".to_string(),
            }
        );
        assert_eq!(settings.retry, RetrySettings::default());
    }

    #[test]
    fn test_webapp_settings_ignore_script_section() {
        let content = r#"
[app]
app_id = "abc123"
app_secret = "s3cret"
user_agent = "flairbot/0.1"
auth_type = "webapp"

[auth-webapp]
token = "refresh-me"

[subreddit]
name = "leagueofrust"

[subject]
subject = "Flair Request"

[log]
logging = false

[retry]
max_attempts = 5
"#;
        let settings = Settings::from_toml_str(content).unwrap();
        assert_eq!(
            settings.auth,
            AuthMode::WebApp {
                refresh_token: "refresh-me".to_string()
            }
        );
        assert!(!settings.logging);
        assert_eq!(settings.retry.max_attempts, Some(5));
        assert_eq!(settings.retry.base_delay_ms, None);
    }

    #[test]
    fn test_missing_key_fails() {
        let content = SCRIPT_SETTINGS.replace("logging = true", "");
        let result = Settings::from_toml_str(&content);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_auth_section_fails() {
        let content = SCRIPT_SETTINGS.replace("auth_type = \"script\"", "auth_type = \"webapp\"");
        match Settings::from_toml_str(&content) {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "auth-webapp"),
            other => panic!("Expected MissingField, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_auth_type_fails() {
        let content = SCRIPT_SETTINGS.replace("auth_type = \"script\"", "auth_type = \"installed\"");
        match Settings::from_toml_str(&content) {
            Err(ConfigError::InvalidValue { field, value }) => {
                assert_eq!(field, "app.auth_type");
                assert_eq!(value, "installed");
            }
            other => panic!("Expected InvalidValue, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_blank_credentials_fail() {
        let content = SCRIPT_SETTINGS.replace("passwd = \"hunter2\"", "passwd = \"  \"");
        assert!(matches!(
            Settings::from_toml_str(&content),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = Settings::from_toml_str(SCRIPT_SETTINGS).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("FlairBot"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(dir.path().join("conf.toml"));
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT_SETTINGS.as_bytes()).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.auth.as_str(), "script");
    }
}
