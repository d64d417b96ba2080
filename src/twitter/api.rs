//! X API v2 client.
//!
//! This module contains the HTTP implementation of [`SocialBackend`]: it builds
//! the request URLs, attaches the OAuth 2.0 User Context header, refreshes an
//! expired access token on 401, waits out 429 responses and decodes the
//! JSON envelopes into raw records.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;

use super::backend::{FollowingPage, RawTweet, RawUser, SearchPage, SocialBackend};
use super::error::{TwitterError, TwitterResult};
use crate::config::{mask_secret, TwitterConfig};
use crate::oauth::{build_oauth2_user_context_header, refresh_access_token};

const API_BASE: &str = "https://api.x.com/2";

const SEARCH_TWEET_FIELDS: &str = "created_at,author_id,public_metrics";
const SEARCH_USER_FIELDS: &str = "username,name,verified";

/// How many times a request waits for the rate-limit window before giving up.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
/// Longest single wait for a rate-limit reset (one full 15 minute window).
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);
/// Wait used when the response carries no usable reset header.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Sanitizes text for safe logging by truncating and escaping control characters.
///
/// Newlines and tabs become spaces and other control characters become `?`,
/// so response bodies cannot inject fake log lines.
pub(crate) fn sanitize_for_logging(text: &str, max_len: usize) -> String {
    let sanitized: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .collect();

    if sanitized.chars().count() > max_len {
        let truncated: String = sanitized.chars().take(max_len).collect();
        format!(
            "{}... [truncated, {} total bytes]",
            truncated,
            text.len()
        )
    } else {
        sanitized
    }
}

/// Computes how long to wait after a 429 from the `x-rate-limit-reset` value.
///
/// `reset` is the epoch second at which the window reopens. The wait is at
/// least one second and at most [`MAX_RATE_LIMIT_WAIT`].
pub(crate) fn rate_limit_wait(reset: Option<&str>, now_epoch_secs: i64) -> Duration {
    match reset.and_then(|r| r.trim().parse::<i64>().ok()) {
        Some(reset_at) => {
            let secs = reset_at
                .saturating_sub(now_epoch_secs)
                .saturating_add(1)
                .max(1) as u64;
            Duration::from_secs(secs).min(MAX_RATE_LIMIT_WAIT)
        }
        None => DEFAULT_RATE_LIMIT_WAIT,
    }
}

fn reset_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<D> {
    data: Option<D>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    errors: Option<Vec<ApiProblem>>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ApiProblem {
    fn describe(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{}: {}", title, detail),
            (Some(title), None) => title.clone(),
            (None, Some(detail)) => detail.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountRef {
    id: String,
}

impl<D> ApiEnvelope<D> {
    /// Splits the envelope, treating `errors` without `data` as a failure.
    fn into_parts(self, operation: &str) -> TwitterResult<(Option<D>, Option<Includes>, Option<String>)> {
        let next_token = self.meta.and_then(|m| m.next_token);
        match (self.data, self.errors) {
            (None, Some(errors)) if !errors.is_empty() => {
                let detail = errors
                    .iter()
                    .map(ApiProblem::describe)
                    .collect::<Vec<_>>()
                    .join("; ");
                error!("Twitter API error for operation '{}': {}", operation, detail);
                Err(TwitterError::Api {
                    operation: operation.to_string(),
                    detail,
                })
            }
            (data, errors) => {
                if let Some(errors) = errors {
                    for problem in &errors {
                        warn!(
                            "Partial error in '{}' response: {}",
                            operation,
                            problem.describe()
                        );
                    }
                }
                Ok((data, self.includes, next_token))
            }
        }
    }
}

struct Credentials {
    access_token: String,
    refresh_token: Option<String>,
}

/// HTTP client for the X API v2 endpoints the monitor uses.
pub struct XApiClient {
    client: Client,
    credentials: RwLock<Credentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl XApiClient {
    /// Creates a client from already validated credentials.
    pub fn new(config: &TwitterConfig) -> TwitterResult<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(XApiClient {
            client,
            credentials: RwLock::new(Credentials {
                access_token: config.access_token.clone(),
                refresh_token: config.refresh_token.clone(),
            }),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    async fn can_refresh_token(&self) -> bool {
        self.client_id.is_some()
            && self.client_secret.is_some()
            && self.credentials.read().await.refresh_token.is_some()
    }

    async fn refresh(&self) -> TwitterResult<()> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => return Err(TwitterError::TokenRefresh("missing client credentials".to_string())),
        };

        let mut credentials = self.credentials.write().await;
        let refresh_token = credentials
            .refresh_token
            .clone()
            .ok_or_else(|| TwitterError::TokenRefresh("missing refresh token".to_string()))?;

        let (access_token, rotated) =
            refresh_access_token(&self.client, client_id, client_secret, &refresh_token).await?;

        debug!("Updated access token (masked): {}", mask_secret(&access_token));
        credentials.access_token = access_token;
        if let Some(rotated) = rotated {
            credentials.refresh_token = Some(rotated);
            warn!("Refresh token rotated in memory only - update xapi_refresh_token before the next restart");
        }
        info!("Access token refreshed successfully");
        Ok(())
    }

    /// Sends an authenticated GET and decodes the JSON body.
    ///
    /// A 401 triggers one token refresh (when refresh credentials exist) and a
    /// retry. A 429 waits until the rate-limit window resets and retries, up
    /// to [`MAX_RATE_LIMIT_RETRIES`] times.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, operation: &str) -> TwitterResult<T> {
        info!("Making authenticated request for operation: {}", operation);
        debug!("Request URL: {}", url);

        let mut refreshed = false;
        let mut rate_limit_waits: u32 = 0;

        loop {
            let auth_header = {
                let credentials = self.credentials.read().await;
                build_oauth2_user_context_header(&credentials.access_token)
            };

            let response = self
                .client
                .get(url)
                .header(AUTHORIZATION, auth_header)
                .send()
                .await?;

            let status = response.status();
            info!(
                "Received response with status: {} for operation: {}",
                status, operation
            );

            if status.is_success() {
                let response_text = response.text().await?;
                debug!(
                    "Response summary for '{}': {} bytes received",
                    operation,
                    response_text.len()
                );
                return Ok(serde_json::from_str(&response_text)?);
            }

            if status == StatusCode::UNAUTHORIZED {
                warn!(
                    "Received 401 Unauthorized for operation '{}' - access token may be expired",
                    operation
                );
                if refreshed || !self.can_refresh_token().await {
                    error!(
                        "Cannot refresh token for operation '{}' - missing refresh credentials or refresh already attempted",
                        operation
                    );
                    return Err(TwitterError::Unauthorized(operation.to_string()));
                }
                self.refresh().await?;
                refreshed = true;
                info!("Token refreshed successfully, retrying operation '{}'", operation);
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if rate_limit_waits >= MAX_RATE_LIMIT_RETRIES {
                    error!(
                        "Rate limit still exceeded for operation '{}' after {} waits",
                        operation, rate_limit_waits
                    );
                    return Err(TwitterError::RateLimited(operation.to_string()));
                }
                let wait = rate_limit_wait(
                    reset_header(response.headers()),
                    chrono::Utc::now().timestamp(),
                );
                warn!(
                    "Rate limited on operation '{}', waiting {}s before retrying",
                    operation,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                rate_limit_waits += 1;
                continue;
            }

            let error_text = response.text().await?;
            error!("Operation '{}' failed - Status: {}", operation, status);
            debug!(
                "Error response for '{}': {}",
                operation,
                sanitize_for_logging(&error_text, 200)
            );
            return Err(TwitterError::Status {
                operation: operation.to_string(),
                status,
            });
        }
    }
}

#[async_trait]
impl SocialBackend for XApiClient {
    async fn search_recent(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> TwitterResult<SearchPage> {
        let mut url = format!(
            "{}/tweets/search/recent?query={}&max_results={}&tweet.fields={}&expansions=author_id&user.fields={}",
            API_BASE,
            urlencoding::encode(query),
            page_size,
            SEARCH_TWEET_FIELDS,
            SEARCH_USER_FIELDS
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&next_token={}", urlencoding::encode(cursor)));
        }

        let envelope: ApiEnvelope<Vec<RawTweet>> = self.get_json(&url, "search_tweets").await?;
        let (data, includes, next_cursor) = envelope.into_parts("search_tweets")?;

        Ok(SearchPage {
            tweets: data.unwrap_or_default(),
            authors: includes.map(|i| i.users).unwrap_or_default(),
            next_cursor,
        })
    }

    async fn authenticated_account_id(&self) -> TwitterResult<String> {
        let url = format!("{}/users/me", API_BASE);
        let envelope: ApiEnvelope<AccountRef> = self.get_json(&url, "get_me").await?;
        let (data, _, _) = envelope.into_parts("get_me")?;
        data.map(|account| account.id).ok_or_else(|| TwitterError::Api {
            operation: "get_me".to_string(),
            detail: "response has no data".to_string(),
        })
    }

    async fn followed_accounts(
        &self,
        account_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> TwitterResult<FollowingPage> {
        let mut url = format!(
            "{}/users/{}/following?max_results={}",
            API_BASE,
            urlencoding::encode(account_id),
            page_size
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&pagination_token={}", urlencoding::encode(cursor)));
        }

        let envelope: ApiEnvelope<Vec<AccountRef>> =
            self.get_json(&url, "fetch_user_following").await?;
        let (data, _, next_cursor) = envelope.into_parts("fetch_user_following")?;

        Ok(FollowingPage {
            account_ids: data
                .unwrap_or_default()
                .into_iter()
                .map(|account| account.id)
                .collect(),
            next_cursor,
        })
    }
}
