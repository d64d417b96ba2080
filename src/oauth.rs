//! OAuth 2.0 helpers for Twitter/X API integration.
//!
//! This module builds the User Context authorization header and exchanges a
//! refresh token for a new access token.

use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;

use crate::twitter::{TwitterError, TwitterResult};

/// Token endpoint for the OAuth 2.0 refresh grant.
const TOKEN_URL: &str = "https://api.x.com/2/oauth2/token";

/// Builds the Authorization header for OAuth 2.0 User Context authentication.
///
/// # Example
///
/// ```rust
/// use xmonitor::build_oauth2_user_context_header;
///
/// let header = build_oauth2_user_context_header("your_access_token");
/// assert_eq!(header, "Bearer your_access_token");
/// ```
pub fn build_oauth2_user_context_header(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Refreshes an OAuth 2.0 User Context access token using a refresh token.
///
/// # Returns
///
/// - `Ok((access_token, Some(refresh_token)))`: When Twitter rotated the refresh token as well
/// - `Ok((access_token, None))`: When only the access token was renewed
/// - `Err(TwitterError)`: If the request fails or the response has no access token
pub async fn refresh_access_token(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> TwitterResult<(String, Option<String>)> {
    info!("Requesting new access token with refresh token");

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];

    let response = client
        .post(TOKEN_URL)
        .basic_auth(client_id, Some(client_secret))
        .form(&params)
        .send()
        .await?;

    let status = response.status();
    let response_text = response.text().await?;
    if !status.is_success() {
        error!("Token refresh failed with status {}", status);
        debug!(
            "Token refresh error response: {}",
            crate::twitter::sanitize_for_logging(&response_text, 200)
        );
        return Err(TwitterError::TokenRefresh(format!("status {}", status)));
    }

    let token: TokenResponse = serde_json::from_str(&response_text)
        .map_err(|e| TwitterError::TokenRefresh(format!("invalid token response: {}", e)))?;

    if token.refresh_token.is_some() {
        info!("Received rotated refresh token along with the new access token");
    }
    Ok((token.access_token, token.refresh_token))
}
