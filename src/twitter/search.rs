//! Paginated keyword search against the recent-search endpoint.
//!
//! This module collects tweets page by page until the requested limit is
//! reached or the endpoint runs out of pages, joining each tweet with its
//! author record and normalizing it on the way.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::backend::{RawUser, SocialBackend};
use super::error::TwitterResult;
use super::model::{
    clamp_limit, NormalizedTweet, SearchDiagnostic, SearchOutcome, MAX_PAGE_RESULTS,
};

/// The recent-search endpoint rejects `max_results` below this value.
const MIN_PAGE_RESULTS: u32 = 10;

/// Upper bound on pages per query, in case the endpoint keeps handing out
/// cursors for empty pages.
const MAX_SEARCH_PAGES: u32 = 10;

/// Runs keyword searches against a [`SocialBackend`].
#[derive(Clone)]
pub struct SearchExecutor {
    backend: Arc<dyn SocialBackend>,
}

impl SearchExecutor {
    pub fn new(backend: Arc<dyn SocialBackend>) -> Self {
        SearchExecutor { backend }
    }

    /// Searches for `query` and returns at most `limit` normalized tweets.
    ///
    /// Errors from the backend are propagated. Most callers want
    /// [`SearchExecutor::search`], which turns them into an empty outcome.
    ///
    /// # Parameters
    ///
    /// - `query`: The search query, passed to the endpoint as-is
    /// - `limit`: Maximum number of tweets, clamped to `1..=100`
    pub async fn try_search(&self, query: &str, limit: u32) -> TwitterResult<Vec<NormalizedTweet>> {
        let limit = clamp_limit(limit) as usize;
        info!("Searching tweets for query '{}' (limit {})", query, limit);

        let mut authors: HashMap<String, RawUser> = HashMap::new();
        let mut tweets: Vec<NormalizedTweet> = Vec::with_capacity(limit);
        let mut cursor: Option<String> = None;
        let mut page_count: u32 = 0;

        loop {
            let remaining = (limit - tweets.len()) as u32;
            let page_size = remaining.clamp(MIN_PAGE_RESULTS, MAX_PAGE_RESULTS);

            let page = self
                .backend
                .search_recent(query, page_size, cursor.as_deref())
                .await?;
            page_count += 1;

            debug!(
                "Search page {} for '{}': {} tweets, {} authors",
                page_count,
                query,
                page.tweets.len(),
                page.authors.len()
            );

            for user in page.authors {
                authors.insert(user.id.clone(), user);
            }

            let room = limit - tweets.len();
            tweets.extend(
                page.tweets
                    .into_iter()
                    .take(room)
                    .map(|raw| NormalizedTweet::from_raw(raw, &authors)),
            );

            if tweets.len() >= limit {
                break;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }

            if page_count >= MAX_SEARCH_PAGES {
                warn!(
                    "Reached max page limit ({}) for query '{}', stopping with {} tweets",
                    MAX_SEARCH_PAGES,
                    query,
                    tweets.len()
                );
                break;
            }
        }

        info!(
            "Found {} tweets for query '{}' ({} pages)",
            tweets.len(),
            query,
            page_count
        );
        Ok(tweets)
    }

    /// Fetches a single page for `query` and returns how many tweets it held.
    ///
    /// The page's cursor is ignored, so this is always exactly one request.
    /// The count is capped at `limit`.
    pub async fn first_page_count(&self, query: &str, limit: u32) -> TwitterResult<usize> {
        let limit = clamp_limit(limit);
        let page_size = limit.clamp(MIN_PAGE_RESULTS, MAX_PAGE_RESULTS);

        let page = self.backend.search_recent(query, page_size, None).await?;
        let found = page.tweets.len().min(limit as usize);
        debug!("First page for '{}' returned {} tweets", query, found);
        Ok(found)
    }

    /// Searches for `query`, converting any failure into an empty outcome.
    ///
    /// The failure is kept as a [`SearchDiagnostic::SearchFailed`] entry so
    /// callers can tell "nothing found" from "search broke" if they care.
    pub async fn search(&self, query: &str, limit: u32) -> SearchOutcome {
        match self.try_search(query, limit).await {
            Ok(tweets) => SearchOutcome::new(tweets),
            Err(e) => {
                warn!("Error searching tweets for '{}': {}", query, e);
                SearchOutcome::failed(SearchDiagnostic::SearchFailed(e.to_string()))
            }
        }
    }
}
