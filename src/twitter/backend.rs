//! The social backend seam.
//!
//! Everything above this trait (executor, resolver, follow-graph cache) only
//! sees these raw records, so the pipeline can run against the real X API
//! client or a scripted backend in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::error::TwitterResult;

/// A tweet as returned in the `data` array of the search endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawTweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub public_metrics: Option<BTreeMap<String, u64>>,
}

/// A user record from the `includes.users` expansion.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub tweets: Vec<RawTweet>,
    pub authors: Vec<RawUser>,
    pub next_cursor: Option<String>,
}

/// One page of the "accounts followed by" listing.
#[derive(Debug, Clone, Default)]
pub struct FollowingPage {
    pub account_ids: Vec<String>,
    pub next_cursor: Option<String>,
}

/// Operations the search pipeline needs from the social network.
///
/// Implementations handle authentication, rate-limit waits and retries on
/// their own; a returned `Ok` is treated as final by the callers.
#[async_trait]
pub trait SocialBackend: Send + Sync {
    /// Fetches one page of recent tweets matching `query`.
    async fn search_recent(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> TwitterResult<SearchPage>;

    /// Returns the id of the account the credentials belong to.
    async fn authenticated_account_id(&self) -> TwitterResult<String>;

    /// Fetches one page of ids of the accounts `account_id` follows.
    async fn followed_accounts(
        &self,
        account_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> TwitterResult<FollowingPage>;
}
