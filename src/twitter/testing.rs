//! Scripted in-memory backend shared by the crate's tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use super::backend::{FollowingPage, RawTweet, RawUser, SearchPage, SocialBackend};
use super::error::{TwitterError, TwitterResult};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Search {
        query: String,
        page_size: u32,
        cursor: Option<String>,
    },
    Me,
    Following {
        account_id: String,
        page_size: u32,
        cursor: Option<String>,
    },
}

/// Backend that replays queued responses and records every call.
///
/// Search and identity responses are consumed in order; when the queue is
/// empty an empty page (or the default owner id) is returned. Following pages
/// are served by cursor so the follow graph can be populated repeatedly.
pub(crate) struct ScriptedBackend {
    searches: Mutex<VecDeque<TwitterResult<SearchPage>>>,
    identities: Mutex<VecDeque<TwitterResult<String>>>,
    following: Mutex<Vec<FollowingPage>>,
    calls: Mutex<Vec<Call>>,
}

pub(crate) const OWNER_ID: &str = "999";

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        ScriptedBackend {
            searches: Mutex::new(VecDeque::new()),
            identities: Mutex::new(VecDeque::new()),
            following: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_search(self, page: SearchPage) -> Self {
        self.searches.lock().unwrap().push_back(Ok(page));
        self
    }

    pub(crate) fn push_search_error(self, message: &str) -> Self {
        self.searches.lock().unwrap().push_back(Err(api_error(message)));
        self
    }

    pub(crate) fn push_identity_error(self, message: &str) -> Self {
        self.identities
            .lock()
            .unwrap()
            .push_back(Err(api_error(message)));
        self
    }

    /// Serves `pages` of followed ids, linked with `page-N` cursors.
    pub(crate) fn with_following(self, pages: &[&[&str]]) -> Self {
        let count = pages.len();
        let built = pages
            .iter()
            .enumerate()
            .map(|(i, ids)| FollowingPage {
                account_ids: ids.iter().map(|id| id.to_string()).collect(),
                next_cursor: (i + 1 < count).then(|| format!("page-{}", i + 1)),
            })
            .collect();
        *self.following.lock().unwrap() = built;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn search_calls(&self) -> Vec<(String, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search {
                    query, page_size, ..
                } => Some((query, page_size)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn identity_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Me))
            .count()
    }
}

#[async_trait]
impl SocialBackend for ScriptedBackend {
    async fn search_recent(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> TwitterResult<SearchPage> {
        self.calls.lock().unwrap().push(Call::Search {
            query: query.to_string(),
            page_size,
            cursor: cursor.map(String::from),
        });
        self.searches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn authenticated_account_id(&self) -> TwitterResult<String> {
        self.calls.lock().unwrap().push(Call::Me);
        self.identities
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OWNER_ID.to_string()))
    }

    async fn followed_accounts(
        &self,
        account_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> TwitterResult<FollowingPage> {
        self.calls.lock().unwrap().push(Call::Following {
            account_id: account_id.to_string(),
            page_size,
            cursor: cursor.map(String::from),
        });
        let index = match cursor {
            None => 0,
            Some(c) => c
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| api_error("unknown pagination token"))?,
        };
        Ok(self
            .following
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default())
    }
}

pub(crate) fn api_error(message: &str) -> TwitterError {
    TwitterError::Api {
        operation: "scripted".to_string(),
        detail: message.to_string(),
    }
}

pub(crate) fn raw_tweet(id: &str, author_id: &str, text: &str) -> RawTweet {
    let mut metrics = BTreeMap::new();
    metrics.insert("like_count".to_string(), 5);
    metrics.insert("retweet_count".to_string(), 2);
    RawTweet {
        id: id.to_string(),
        text: text.to_string(),
        created_at: Some("2024-01-01T10:00:00.000Z".to_string()),
        author_id: Some(author_id.to_string()),
        public_metrics: Some(metrics),
    }
}

pub(crate) fn raw_user(id: &str, username: &str, verified: bool) -> RawUser {
    RawUser {
        id: id.to_string(),
        username: Some(username.to_string()),
        name: Some(format!("Name of {}", username)),
        verified: Some(verified),
    }
}

pub(crate) fn page(tweets: Vec<RawTweet>, authors: Vec<RawUser>, next_cursor: Option<&str>) -> SearchPage {
    SearchPage {
        tweets,
        authors,
        next_cursor: next_cursor.map(String::from),
    }
}

/// The two "AI" tweets by authors 1001 and 1002, with both authors included.
pub(crate) fn ai_page() -> SearchPage {
    page(
        vec![
            raw_tweet("123456", "1001", "Test tweet about #AI from user1"),
            raw_tweet("789012", "1002", "Another #AI tweet from user2"),
        ],
        vec![raw_user("1001", "user1", false), raw_user("1002", "user2", true)],
        None,
    )
}
