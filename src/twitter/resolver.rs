//! Keyword search with an optional "only accounts I follow" restriction.
//!
//! The X API documents no reliable way to restrict a recent search to the
//! accounts the caller follows. The resolver appends the `from:following`
//! operator and probes with a small request first: if anything comes back
//! the operator is trusted for the full request, otherwise the search is
//! repeated without it and filtered locally against the follow graph.

use log::{info, warn};
use std::sync::Arc;

use super::following::FollowGraphCache;
use super::model::{clamp_limit, FollowingStrategy, SearchDiagnostic, SearchOutcome, SearchQuery};
use super::search::SearchExecutor;

/// Query operator asking the backend for tweets from followed accounts only.
pub const FOLLOWING_FILTER_TOKEN: &str = "from:following";

/// Size of the request used to check whether the server-side filter works.
pub const PROBE_LIMIT: u32 = 10;

/// Builds the query with the server-side following filter appended.
pub fn augmented_query(keyword: &str) -> String {
    format!("{} {}", keyword, FOLLOWING_FILTER_TOKEN)
}

/// Resolves keyword searches, applying the following restriction when asked.
#[derive(Clone)]
pub struct FollowingResolver {
    executor: SearchExecutor,
    follow_graph: Arc<FollowGraphCache>,
}

impl FollowingResolver {
    pub fn new(executor: SearchExecutor, follow_graph: Arc<FollowGraphCache>) -> Self {
        FollowingResolver {
            executor,
            follow_graph,
        }
    }

    pub fn follow_graph(&self) -> &Arc<FollowGraphCache> {
        &self.follow_graph
    }

    /// Searches for `keyword`, optionally restricted to followed accounts.
    ///
    /// Never fails: transport errors end up as an empty outcome and the
    /// problems met along the way are listed in `diagnostics`.
    ///
    /// # Parameters
    ///
    /// - `keyword`: The bare search keyword
    /// - `restrict_following`: Only keep tweets from accounts the authenticated user follows
    /// - `limit`: Maximum number of tweets, clamped to `1..=100`
    pub async fn resolve(&self, keyword: &str, restrict_following: bool, limit: u32) -> SearchOutcome {
        let limit = clamp_limit(limit);
        info!(
            "Resolving search for '{}' (restrict_following: {}, limit: {})",
            keyword, restrict_following, limit
        );

        let (strategy, mut diagnostics) = self.decide(keyword, restrict_following, limit).await;
        let mut outcome = self.execute(strategy, keyword, limit).await;

        diagnostics.append(&mut outcome.diagnostics);
        outcome.diagnostics = diagnostics;
        outcome.strategy = strategy;

        info!(
            "Search for '{}' returned {} tweets via {:?}",
            keyword,
            outcome.tweets.len(),
            strategy
        );
        outcome
    }

    /// Same as [`FollowingResolver::resolve`] for a prepared [`SearchQuery`].
    pub async fn resolve_query(&self, query: &SearchQuery) -> SearchOutcome {
        self.resolve(&query.keyword, query.restrict_following, query.max_results)
            .await
    }

    /// Picks the strategy for one call, probing the server-side filter if needed.
    async fn decide(
        &self,
        keyword: &str,
        restrict_following: bool,
        limit: u32,
    ) -> (FollowingStrategy, Vec<SearchDiagnostic>) {
        if !restrict_following {
            return (FollowingStrategy::Unrestricted, Vec::new());
        }

        let probe_query = augmented_query(keyword);
        let probe_limit = PROBE_LIMIT.min(limit);

        match self.executor.first_page_count(&probe_query, probe_limit).await {
            Ok(found) if found > 0 => {
                info!(
                    "Server-side following filter returned {} tweets in probe, using it",
                    found
                );
                (FollowingStrategy::ServerFilterConfirmed, Vec::new())
            }
            Ok(_) => {
                info!("Server-side following filter returned no tweets, falling back to local filtering");
                (
                    FollowingStrategy::ClientFallback,
                    vec![SearchDiagnostic::ProbeEmpty],
                )
            }
            Err(e) => {
                warn!(
                    "Server-side following filter probe failed, falling back to local filtering: {}",
                    e
                );
                (
                    FollowingStrategy::ClientFallback,
                    vec![SearchDiagnostic::ProbeFailed(e.to_string())],
                )
            }
        }
    }

    async fn execute(&self, strategy: FollowingStrategy, keyword: &str, limit: u32) -> SearchOutcome {
        match strategy {
            FollowingStrategy::Unrestricted => self.executor.search(keyword, limit).await,
            FollowingStrategy::ServerFilterConfirmed => {
                self.executor.search(&augmented_query(keyword), limit).await
            }
            FollowingStrategy::ClientFallback => {
                let mut outcome = self.executor.search(keyword, limit).await;
                if outcome.tweets.is_empty() {
                    return outcome;
                }
                let tweets = std::mem::take(&mut outcome.tweets);
                let (filtered, diagnostic) = self.follow_graph.filter(tweets).await;
                outcome.tweets = filtered;
                outcome.diagnostics.extend(diagnostic);
                outcome
            }
        }
    }
}
