//! Follow-graph cache and client-side following filter.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::backend::SocialBackend;
use super::error::TwitterResult;
use super::model::{NormalizedTweet, SearchDiagnostic};

/// Largest page the following endpoint accepts.
const FOLLOWING_PAGE_SIZE: u32 = 1000;

/// Default number of followed accounts collected.
pub const DEFAULT_FOLLOWING_CAP: usize = 5000;

/// Snapshot of the accounts the authenticated account follows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowSet {
    pub owner_id: String,
    pub followed_ids: HashSet<String>,
}

impl FollowSet {
    pub fn is_empty(&self) -> bool {
        self.followed_ids.is_empty()
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.followed_ids.contains(account_id)
    }
}

/// Limits applied while populating the cache.
#[derive(Debug, Clone)]
pub struct FollowGraphSettings {
    /// Stop collecting after this many followed accounts.
    pub cap: usize,
    /// Pause between following pages (the endpoint allows 15 requests per 15 minutes).
    pub page_delay: Duration,
}

impl Default for FollowGraphSettings {
    fn default() -> Self {
        FollowGraphSettings {
            cap: DEFAULT_FOLLOWING_CAP,
            page_delay: Duration::from_millis(500),
        }
    }
}

/// Process-wide cache of the authenticated account's follow graph.
///
/// Populated lazily on first access and kept until [`FollowGraphCache::invalidate`].
/// The lock is held for the whole population so concurrent first readers
/// wait for one fetch instead of each issuing their own.
pub struct FollowGraphCache {
    backend: Arc<dyn SocialBackend>,
    settings: FollowGraphSettings,
    state: Mutex<Option<Arc<FollowSet>>>,
}

impl FollowGraphCache {
    pub fn new(backend: Arc<dyn SocialBackend>, settings: FollowGraphSettings) -> Self {
        FollowGraphCache {
            backend,
            settings,
            state: Mutex::new(None),
        }
    }

    /// Returns the cached follow set, populating it first if needed.
    ///
    /// A failed population is returned as an error and leaves the cache
    /// empty, so the next call tries again.
    pub async fn snapshot(&self) -> TwitterResult<Arc<FollowSet>> {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            debug!(
                "Using cached follow graph ({} accounts)",
                cached.followed_ids.len()
            );
            return Ok(Arc::clone(cached));
        }

        let follow_set = Arc::new(self.populate().await?);
        *state = Some(Arc::clone(&follow_set));
        Ok(follow_set)
    }

    /// Returns the followed account ids, or an empty set if they cannot be fetched.
    pub async fn followed_ids(&self) -> Arc<FollowSet> {
        match self.snapshot().await {
            Ok(follow_set) => follow_set,
            Err(e) => {
                warn!("Error getting following list: {}", e);
                Arc::new(FollowSet::default())
            }
        }
    }

    /// Drops the cached follow set; the next access fetches it again.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            info!("Follow graph cache cleared");
        }
    }

    /// Filters `tweets` down to those written by followed accounts.
    ///
    /// When the follow graph is unavailable or empty the tweets are returned
    /// unchanged, with a diagnostic saying why.
    pub async fn filter(
        &self,
        tweets: Vec<NormalizedTweet>,
    ) -> (Vec<NormalizedTweet>, Option<SearchDiagnostic>) {
        let follow_set = match self.snapshot().await {
            Ok(follow_set) => follow_set,
            Err(e) => {
                warn!(
                    "Follow graph unavailable, returning {} unfiltered tweets: {}",
                    tweets.len(),
                    e
                );
                return (
                    tweets,
                    Some(SearchDiagnostic::FollowGraphUnavailable(e.to_string())),
                );
            }
        };

        if follow_set.is_empty() {
            warn!(
                "No followed accounts, returning {} unfiltered tweets",
                tweets.len()
            );
            return (tweets, Some(SearchDiagnostic::FollowGraphEmpty));
        }

        let before = tweets.len();
        let filtered = filter_by_following(tweets, &follow_set);
        info!(
            "Filtered {} tweets down to {} from followed accounts",
            before,
            filtered.len()
        );
        (filtered, None)
    }

    async fn populate(&self) -> TwitterResult<FollowSet> {
        let owner_id = self.backend.authenticated_account_id().await?;
        info!("Fetching following list for user {}", owner_id);

        let mut followed_ids = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut page_count: u32 = 0;

        loop {
            let page = self
                .backend
                .followed_accounts(&owner_id, FOLLOWING_PAGE_SIZE, cursor.as_deref())
                .await?;
            page_count += 1;

            for account_id in page.account_ids {
                if followed_ids.len() >= self.settings.cap {
                    break;
                }
                followed_ids.insert(account_id);
            }

            if followed_ids.len() >= self.settings.cap {
                warn!(
                    "Reached following cap ({}), stopping after {} pages",
                    self.settings.cap, page_count
                );
                break;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }

            if !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        info!(
            "Fetched {} accounts that user {} follows ({} pages)",
            followed_ids.len(),
            owner_id,
            page_count
        );

        Ok(FollowSet {
            owner_id,
            followed_ids,
        })
    }
}

/// Keeps the tweets whose author is in `follow_set`, preserving order.
pub fn filter_by_following(tweets: Vec<NormalizedTweet>, follow_set: &FollowSet) -> Vec<NormalizedTweet> {
    tweets
        .into_iter()
        .filter(|tweet| {
            tweet
                .author_id
                .as_deref()
                .is_some_and(|author_id| follow_set.contains(author_id))
        })
        .collect()
}
