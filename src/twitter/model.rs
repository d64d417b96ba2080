//! Normalized tweet representation and search outcome types.
//!
//! The X API returns tweets and their authors as separate arrays with a
//! handful of optional fields. Everything downstream (summarization, storage,
//! the REST API) works on [`NormalizedTweet`] instead.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::backend::{RawTweet, RawUser};

/// Hard cap the search endpoint accepts for `max_results` on one page.
pub const MAX_PAGE_RESULTS: u32 = 100;

/// Default number of tweets fetched per keyword.
pub const DEFAULT_MAX_RESULTS: u32 = 50;

/// Author details attached to a tweet when the expansion included them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetAuthor {
    pub username: Option<String>,
    #[serde(rename = "name")]
    pub display_name: Option<String>,
    pub verified: Option<bool>,
}

/// A tweet in the stable schema used by summarization and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTweet {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub author_id: Option<String>,
    pub author: Option<TweetAuthor>,
    #[serde(rename = "public_metrics", default)]
    pub metrics: BTreeMap<String, u64>,
    #[serde(rename = "url")]
    pub permalink: String,
}

/// Builds the public link for a tweet id.
pub fn permalink_for(tweet_id: &str) -> String {
    format!("https://twitter.com/i/status/{}", tweet_id)
}

impl NormalizedTweet {
    /// Normalizes a raw tweet, joining its author from `authors` by id.
    ///
    /// Unparsable timestamps and unknown authors become `None`; they never
    /// cause the tweet to be dropped.
    pub fn from_raw(raw: RawTweet, authors: &HashMap<String, RawUser>) -> Self {
        let created_at = raw.created_at.as_deref().and_then(|s| {
            match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Failed to parse created_at '{}' for tweet {}: {}", s, raw.id, e);
                    None
                }
            }
        });

        let author = raw
            .author_id
            .as_deref()
            .and_then(|author_id| authors.get(author_id))
            .map(|user| TweetAuthor {
                username: user.username.clone(),
                display_name: user.name.clone(),
                verified: user.verified,
            });

        let permalink = permalink_for(&raw.id);

        NormalizedTweet {
            id: raw.id,
            text: raw.text,
            created_at,
            author_id: raw.author_id,
            author,
            metrics: raw.public_metrics.unwrap_or_default(),
            permalink,
        }
    }
}

/// Which path a restricted search took to produce its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowingStrategy {
    /// No following restriction was requested.
    Unrestricted,
    /// The probe showed the backend honors the `from:following` operator.
    ServerFilterConfirmed,
    /// Bare keyword search filtered locally against the follow graph.
    ClientFallback,
}

/// Non-fatal problems swallowed while producing an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SearchDiagnostic {
    /// The search request failed; the outcome is empty.
    SearchFailed(String),
    /// The server-side filter probe failed.
    ProbeFailed(String),
    /// The server-side filter probe returned nothing.
    ProbeEmpty,
    /// The follow graph could not be fetched; results are unfiltered.
    FollowGraphUnavailable(String),
    /// The account follows nobody; results are unfiltered.
    FollowGraphEmpty,
}

/// Parameters for one keyword search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub restrict_following: bool,
    pub max_results: u32,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, restrict_following: bool, max_results: u32) -> Self {
        SearchQuery {
            keyword: keyword.into(),
            restrict_following,
            max_results: clamp_limit(max_results),
        }
    }
}

/// Clamps a result limit into `1..=MAX_PAGE_RESULTS`.
pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_RESULTS)
}

/// Tweets in API order plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub tweets: Vec<NormalizedTweet>,
    pub strategy: FollowingStrategy,
    pub diagnostics: Vec<SearchDiagnostic>,
}

impl SearchOutcome {
    pub fn new(tweets: Vec<NormalizedTweet>) -> Self {
        SearchOutcome {
            tweets,
            strategy: FollowingStrategy::Unrestricted,
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(diagnostic: SearchDiagnostic) -> Self {
        SearchOutcome {
            tweets: Vec::new(),
            strategy: FollowingStrategy::Unrestricted,
            diagnostics: vec![diagnostic],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tweets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tweets.len()
    }
}
