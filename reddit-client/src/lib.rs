pub mod api;
pub mod rate_limiter;
pub mod retry;

#[cfg(test)]
mod tests;

use api::RedditApiClient;
use async_trait::async_trait;
use flairbot_core::{AuthMode, CoreError, FlairSession, InboxMessage, RedditApiError, Settings};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RefreshToken,
    RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use retry::{RetryConfig, RetryExecutor};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are treated as expired this long before Reddit would reject them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub credentials: AuthMode,
    pub retry: RetryConfig,
}

impl RedditConfig {
    pub fn new(
        client_id: String,
        client_secret: String,
        user_agent: String,
        credentials: AuthMode,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
            credentials,
            retry: RetryConfig::reddit(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            client_id: settings.app.app_id.clone(),
            client_secret: settings.app.app_secret.clone(),
            user_agent: settings.app.user_agent.clone(),
            credentials: settings.auth.clone(),
            retry: RetryConfig::from_settings(&settings.retry),
        }
    }
}

#[derive(Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + TOKEN_EXPIRY_MARGIN >= self.expires_at
    }

    fn from_response(response: &BasicTokenResponse) -> Self {
        let expires_in = response.expires_in().unwrap_or(Duration::from_secs(3600));
        Self {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + expires_in,
            scope: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for RedditToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { token: RedditToken },
    TokenExpired { token: RedditToken },
}

/// An authenticated Reddit session for one bot account.
#[derive(Debug)]
pub struct RedditClient {
    config: RedditConfig,
    oauth_client: BasicClient,
    api_client: RedditApiClient,
    retry: RetryExecutor,
    auth_state: Mutex<AuthState>,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("Invalid authorize URL: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("Invalid token URL: {}", e),
            }
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let api_client = RedditApiClient::new(config.user_agent.clone())?;
        let retry = RetryExecutor::new(config.retry.clone());

        Ok(Self {
            config,
            oauth_client,
            api_client,
            retry,
            auth_state: Mutex::new(AuthState::NotAuthenticated),
        })
    }

    /// Runs the OAuth grant for the configured auth mode and stores the token.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        let http_client = self.api_client.http_client().clone();

        info!(
            "Authenticating with Reddit ({} mode)",
            self.config.credentials.as_str()
        );
        let result = match &self.config.credentials {
            AuthMode::Script { username, password } => {
                self.oauth_client
                    .exchange_password(
                        &ResourceOwnerUsername::new(username.clone()),
                        &ResourceOwnerPassword::new(password.clone()),
                    )
                    .request_async(|request| send_token_request(http_client, request))
                    .await
            }
            AuthMode::WebApp { refresh_token } => {
                self.oauth_client
                    .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
                    .request_async(|request| send_token_request(http_client, request))
                    .await
            }
        };

        let response = result.map_err(|e| {
            let reason = match e {
                RequestTokenError::ServerResponse(response) => response.error().to_string(),
                RequestTokenError::Request(err) => format!("token request failed: {}", err),
                RequestTokenError::Parse(err, _) => {
                    format!("unexpected token response: {}", err)
                }
                RequestTokenError::Other(message) => message,
            };
            error!("Reddit authentication failed: {}", reason);
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
        })?;

        let token = RedditToken::from_response(&response);
        debug!("Obtained access token with scopes {:?}", token.scope);
        self.set_token(token.clone());
        Ok(token)
    }

    pub fn set_token(&self, token: RedditToken) {
        let state = if token.is_expired() {
            AuthState::TokenExpired { token }
        } else {
            AuthState::Authenticated { token }
        };
        *self.auth_state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn get_auth_state(&self) -> AuthState {
        self.auth_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.get_auth_state(), AuthState::Authenticated { token } if !token.is_expired())
    }

    pub fn needs_refresh(&self) -> bool {
        match self.get_auth_state() {
            AuthState::NotAuthenticated => false,
            AuthState::Authenticated { token } => token.is_expired(),
            AuthState::TokenExpired { .. } => true,
        }
    }

    /// Access token for the next request, re-running the grant if the
    /// current token has expired.
    pub async fn ensure_authenticated(&self) -> Result<String, CoreError> {
        match self.get_auth_state() {
            AuthState::NotAuthenticated => {
                Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: "Not authenticated".to_string(),
                }))
            }
            AuthState::Authenticated { token } if !token.is_expired() => Ok(token.access_token),
            _ => {
                info!("Access token expired, re-authenticating");
                Ok(self.authenticate().await?.access_token)
            }
        }
    }

    /// Runs `operation` with the current access token. Reddit can revoke a
    /// token before its local expiry; a 401 then gets one fresh grant.
    async fn authorized<T, F, Fut>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let access_token = self.ensure_authenticated().await?;
        with_token_refresh(
            access_token,
            || async move { self.authenticate().await.map(|token| token.access_token) },
            operation,
        )
        .await
    }

    pub async fn get_rate_limit_status(&self) -> rate_limiter::RateLimitStatus {
        self.api_client.get_rate_limit_status().await
    }
}

#[async_trait]
impl FlairSession for RedditClient {
    async fn current_user(&self) -> Result<String, CoreError> {
        let user = self
            .authorized(|token| async move {
                self.retry
                    .execute("get_user_info", || self.api_client.get_user_info(&token))
                    .await
            })
            .await?;
        Ok(user.name)
    }

    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, CoreError> {
        let mut messages = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page_after = after.as_deref();
            let listing = self
                .authorized(|token| async move {
                    self.retry
                        .execute("get_unread_page", || {
                            self.api_client.get_unread_page(&token, page_after)
                        })
                        .await
                })
                .await?;

            messages.extend(
                listing
                    .data
                    .children
                    .into_iter()
                    .map(|child| InboxMessage::from(child.data)),
            );

            match listing.data.after {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        info!("Fetched {} unread inbox items", messages.len());
        Ok(messages)
    }

    async fn set_flair(
        &self,
        subreddit: &str,
        username: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), CoreError> {
        self.authorized(|token| async move {
            self.retry
                .execute("set_flair", || {
                    self.api_client
                        .set_user_flair(&token, subreddit, username, text, css_class)
                })
                .await
        })
        .await
    }

    async fn mark_read(&self, message: &InboxMessage) -> Result<(), CoreError> {
        let fullname = message.id.as_str();
        self.authorized(|token| async move {
            self.retry
                .execute("mark_read", || {
                    self.api_client.mark_message_read(&token, fullname)
                })
                .await
        })
        .await
    }
}

/// Runs `operation` with `access_token`, and once more with a token from
/// `reauthenticate` if Reddit rejected the first one.
async fn with_token_refresh<T, F, Fut, R, RFut>(
    access_token: String,
    reauthenticate: R,
    operation: F,
) -> Result<T, CoreError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<String, CoreError>>,
{
    match operation(access_token).await {
        Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
            warn!("Reddit rejected the access token, requesting a new one");
            let access_token = reauthenticate().await?;
            operation(access_token).await
        }
        result => result,
    }
}

/// Sends an OAuth token request through our own HTTP client so Reddit sees
/// the configured user agent on the token endpoint too.
async fn send_token_request(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
