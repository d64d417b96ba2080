//! Twitter/X search integration module.
//!
//! This module contains the keyword search pipeline: the X API v2 client,
//! paginated search, the follow-graph cache and the resolver that decides
//! between the server-side `from:following` filter and local filtering.

mod api;
mod backend;
mod error;
mod following;
mod model;
mod resolver;
mod search;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use api::XApiClient;
pub use backend::{FollowingPage, RawTweet, RawUser, SearchPage, SocialBackend};
pub use error::{TwitterError, TwitterResult};
pub use following::{
    filter_by_following, FollowGraphCache, FollowGraphSettings, FollowSet, DEFAULT_FOLLOWING_CAP,
};
pub use model::{
    clamp_limit, permalink_for, FollowingStrategy, NormalizedTweet, SearchDiagnostic,
    SearchOutcome, SearchQuery, TweetAuthor, DEFAULT_MAX_RESULTS, MAX_PAGE_RESULTS,
};
pub use resolver::{augmented_query, FollowingResolver, FOLLOWING_FILTER_TOKEN, PROBE_LIMIT};
pub use search::SearchExecutor;

pub(crate) use api::sanitize_for_logging;
