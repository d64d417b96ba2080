//! Error type for the Twitter/X API client.

use reqwest::StatusCode;
use thiserror::Error;

pub type TwitterResult<T> = std::result::Result<T, TwitterError>;

#[derive(Error, Debug)]
pub enum TwitterError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Cannot decode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Twitter API error for operation '{operation}' ({status})")]
    Status {
        operation: String,
        status: StatusCode,
    },
    #[error("Unauthorized for operation '{0}' and token refresh not available")]
    Unauthorized(String),
    #[error("Rate limit still exceeded for operation '{0}' after waiting")]
    RateLimited(String),
    #[error("Twitter API returned errors for operation '{operation}': {detail}")]
    Api { operation: String, detail: String },
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),
}
