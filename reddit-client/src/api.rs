use crate::rate_limiter::{RateLimitStatus, RateLimiter};
use flairbot_core::{CoreError, InboxMessage, RedditApiError};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Reddit caps listing pages at 100 items.
pub const INBOX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub modhash: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// An inbox item: a private message (`t4`) or a comment reply (`t1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditMessageData {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_mod: bool,
}

#[derive(Debug, Deserialize)]
struct RedditJsonEnvelope {
    json: RedditJsonBody,
}

#[derive(Debug, Deserialize)]
struct RedditJsonBody {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
}

/// Checks the `{"json": {"errors": [...]}}` body Reddit returns from
/// `api_type=json` endpoints. Reddit reports refused writes with a 200 status
/// and a non-empty error list, e.g. `[["USER_DOESNT_EXIST", "...", "name"]]`.
pub fn check_json_errors(username: &str, body: &str) -> Result<(), CoreError> {
    let envelope: RedditJsonEnvelope = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse flair response: {}", e);
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: "Failed to parse flair response".to_string(),
        })
    })?;

    if envelope.json.errors.is_empty() {
        return Ok(());
    }

    let reason = envelope
        .json
        .errors
        .iter()
        .map(|entry| {
            entry
                .iter()
                .filter_map(|part| part.as_str())
                .collect::<Vec<_>>()
                .join(": ")
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(CoreError::RedditApi(RedditApiError::FlairRejected {
        username: username.to_string(),
        reason,
    }))
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(),
            user_agent,
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);

        self.rate_limiter.acquire_permit().await;

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        self.rate_limiter.record_headers(response.headers()).await;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let api_error = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => RedditApiError::NotFound {
                resource: endpoint.to_string(),
            },
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", code, endpoint),
            },
        };

        Err(CoreError::RedditApi(api_error))
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let response = self
            .make_request(Method::GET, "/api/v1/me", access_token, None, None)
            .await?;

        let user_data: RedditUserData = response.json().await.map_err(|e| {
            error!("Failed to parse user data: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Failed to parse user data".to_string(),
            })
        })?;

        debug!("Retrieved user info for: {}", user_data.name);
        Ok(user_data)
    }

    /// One page of the unread inbox. Reading it does not mark anything read.
    pub async fn get_unread_page(
        &self,
        access_token: &str,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditMessageData>, CoreError> {
        let limit = INBOX_PAGE_LIMIT.to_string();
        let mut params = vec![("limit", limit.as_str()), ("mark", "false")];
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let response = self
            .make_request(
                Method::GET,
                "/message/unread",
                access_token,
                Some(params.as_slice()),
                None,
            )
            .await?;

        let listing: RedditListing<RedditMessageData> = response.json().await.map_err(|e| {
            error!("Failed to parse unread messages: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Failed to parse unread messages".to_string(),
            })
        })?;

        debug!("Retrieved {} unread messages", listing.data.children.len());
        Ok(listing)
    }

    pub async fn set_user_flair(
        &self,
        access_token: &str,
        subreddit: &str,
        username: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), CoreError> {
        let endpoint = format!("/r/{}/api/flair", subreddit);
        let form = [
            ("api_type", "json"),
            ("name", username),
            ("text", text),
            ("css_class", css_class),
        ];

        let response = self
            .make_request(Method::POST, &endpoint, access_token, None, Some(form.as_slice()))
            .await?;
        let body = response.text().await?;
        check_json_errors(username, &body)?;

        info!("Set flair for {} on r/{} to class {}", username, subreddit, css_class);
        Ok(())
    }

    pub async fn mark_message_read(
        &self,
        access_token: &str,
        fullname: &str,
    ) -> Result<(), CoreError> {
        self.make_request(
            Method::POST,
            "/api/read_message",
            access_token,
            None,
            Some([("id", fullname)].as_slice()),
        )
        .await?;

        debug!("Marked {} as read", fullname);
        Ok(())
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

impl From<RedditMessageData> for InboxMessage {
    fn from(message: RedditMessageData) -> Self {
        Self {
            id: message.name,
            author: message.author,
            subject: message.subject,
            body: message.body,
        }
    }
}
