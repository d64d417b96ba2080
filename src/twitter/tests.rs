//! Tests for the keyword search pipeline.
//!
//! Every test drives the real executor, resolver and follow-graph cache
//! against a [`ScriptedBackend`] and checks the outcome together with the
//! exact sequence of backend calls.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::testing::{ai_page, page, raw_tweet, raw_user, Call, ScriptedBackend, OWNER_ID};
use super::*;

fn settings(cap: usize) -> FollowGraphSettings {
    FollowGraphSettings {
        cap,
        page_delay: Duration::ZERO,
    }
}

fn cache_for(backend: &Arc<ScriptedBackend>, cap: usize) -> Arc<FollowGraphCache> {
    let dyn_backend: Arc<dyn SocialBackend> = backend.clone();
    Arc::new(FollowGraphCache::new(dyn_backend, settings(cap)))
}

fn resolver_for(backend: &Arc<ScriptedBackend>) -> FollowingResolver {
    let dyn_backend: Arc<dyn SocialBackend> = backend.clone();
    FollowingResolver::new(SearchExecutor::new(dyn_backend), cache_for(backend, 5000))
}

fn ids(tweets: &[NormalizedTweet]) -> Vec<&str> {
    tweets.iter().map(|t| t.id.as_str()).collect()
}

fn tweet(id: &str, author_id: Option<&str>) -> NormalizedTweet {
    NormalizedTweet {
        id: id.to_string(),
        text: format!("tweet {}", id),
        created_at: None,
        author_id: author_id.map(String::from),
        author: None,
        metrics: BTreeMap::new(),
        permalink: permalink_for(id),
    }
}

fn follow_set(ids: &[&str]) -> FollowSet {
    FollowSet {
        owner_id: OWNER_ID.to_string(),
        followed_ids: ids.iter().map(|id| id.to_string()).collect(),
    }
}

// MARK: Resolver

#[tokio::test]
async fn unrestricted_search_issues_one_call_with_bare_keyword() {
    let backend = Arc::new(ScriptedBackend::new().push_search(ai_page()));
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", false, 50).await;

    assert_eq!(backend.search_calls(), vec![("AI".to_string(), 50)]);
    assert_eq!(outcome.strategy, FollowingStrategy::Unrestricted);
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(ids(&outcome.tweets), vec!["123456", "789012"]);

    let first_author = outcome.tweets[0].author.as_ref().unwrap();
    assert_eq!(first_author.username.as_deref(), Some("user1"));
    assert_eq!(first_author.verified, Some(false));
    let second_author = outcome.tweets[1].author.as_ref().unwrap();
    assert_eq!(second_author.username.as_deref(), Some("user2"));
    assert_eq!(second_author.verified, Some(true));
}

#[tokio::test]
async fn confirmed_server_filter_refetches_augmented_query_with_full_limit() {
    let probe = page(
        vec![raw_tweet("123456", "1001", "Test tweet about #AI from user1")],
        vec![raw_user("1001", "user1", false)],
        None,
    );
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(probe)
            .push_search(ai_page())
            .with_following(&[&["1001"]]),
    );
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", true, 50).await;

    assert_eq!(
        backend.search_calls(),
        vec![
            ("AI from:following".to_string(), 10),
            ("AI from:following".to_string(), 50),
        ]
    );
    assert_eq!(outcome.strategy, FollowingStrategy::ServerFilterConfirmed);
    // No local filtering: the 1002 tweet stays even though only 1001 is followed.
    assert_eq!(ids(&outcome.tweets), vec!["123456", "789012"]);
    assert_eq!(backend.identity_calls(), 0);
    assert!(outcome.diagnostics.is_empty());
}

#[tokio::test]
async fn empty_probe_falls_back_to_local_filtering() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(SearchPage::default())
            .push_search(ai_page())
            .with_following(&[&["1001"]]),
    );
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", true, 50).await;

    assert_eq!(
        backend.search_calls(),
        vec![
            ("AI from:following".to_string(), 10),
            ("AI".to_string(), 50),
        ]
    );
    assert_eq!(outcome.strategy, FollowingStrategy::ClientFallback);
    assert_eq!(ids(&outcome.tweets), vec!["123456"]);
    assert_eq!(outcome.tweets[0].author_id.as_deref(), Some("1001"));
    assert_eq!(
        outcome.tweets[0]
            .author
            .as_ref()
            .and_then(|a| a.username.as_deref()),
        Some("user1")
    );
    assert_eq!(outcome.diagnostics, vec![SearchDiagnostic::ProbeEmpty]);
}

#[tokio::test]
async fn failing_probe_falls_back_to_local_filtering() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search_error("API Error")
            .push_search(ai_page())
            .with_following(&[&["1001"]]),
    );
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", true, 50).await;

    assert_eq!(
        backend.search_calls(),
        vec![
            ("AI from:following".to_string(), 10),
            ("AI".to_string(), 50),
        ]
    );
    assert_eq!(outcome.strategy, FollowingStrategy::ClientFallback);
    assert_eq!(ids(&outcome.tweets), vec!["123456"]);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert!(matches!(
        &outcome.diagnostics[0],
        SearchDiagnostic::ProbeFailed(detail) if detail.contains("API Error")
    ));
}

#[tokio::test]
async fn filter_check_is_one_request_even_when_first_page_has_a_cursor() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(page(vec![], vec![], Some("c1")))
            .push_search(ai_page())
            .push_search(ai_page())
            .with_following(&[&["1001"]]),
    );
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", true, 50).await;

    assert_eq!(
        backend.search_calls(),
        vec![
            ("AI from:following".to_string(), 10),
            ("AI".to_string(), 50),
        ]
    );
    assert!(backend
        .calls()
        .iter()
        .all(|call| !matches!(call, Call::Search { cursor: Some(_), .. })));
    assert_eq!(outcome.strategy, FollowingStrategy::ClientFallback);
    assert_eq!(ids(&outcome.tweets), vec!["123456"]);
    assert_eq!(outcome.diagnostics, vec![SearchDiagnostic::ProbeEmpty]);
}

#[tokio::test]
async fn first_page_count_ignores_cursor_and_caps_at_limit() {
    let backend = Arc::new(ScriptedBackend::new().push_search(page(
        vec![
            raw_tweet("1", "a", "one"),
            raw_tweet("2", "a", "two"),
            raw_tweet("3", "a", "three"),
        ],
        vec![],
        Some("c1"),
    )));
    let executor = SearchExecutor::new(backend.clone());

    let found = executor.first_page_count("AI from:following", 2).await.unwrap();

    assert_eq!(found, 2);
    assert_eq!(
        backend.search_calls(),
        vec![("AI from:following".to_string(), 10)]
    );
}

#[tokio::test]
async fn probe_strictly_precedes_fetch_and_follow_graph_lookup() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(SearchPage::default())
            .push_search(ai_page())
            .with_following(&[&["1001"]]),
    );
    let resolver = resolver_for(&backend);

    resolver.resolve("AI", true, 20).await;

    let calls = backend.calls();
    assert_eq!(
        calls,
        vec![
            Call::Search {
                query: "AI from:following".to_string(),
                page_size: 10,
                cursor: None,
            },
            Call::Search {
                query: "AI".to_string(),
                page_size: 20,
                cursor: None,
            },
            Call::Me,
            Call::Following {
                account_id: OWNER_ID.to_string(),
                page_size: 1000,
                cursor: None,
            },
        ]
    );
}

#[tokio::test]
async fn fallback_with_follow_graph_outage_returns_unfiltered_tweets() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(SearchPage::default())
            .push_search(ai_page())
            .push_identity_error("service unavailable"),
    );
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", true, 50).await;

    assert_eq!(outcome.strategy, FollowingStrategy::ClientFallback);
    assert_eq!(ids(&outcome.tweets), vec!["123456", "789012"]);
    assert_eq!(outcome.diagnostics.len(), 2);
    assert_eq!(outcome.diagnostics[0], SearchDiagnostic::ProbeEmpty);
    assert!(matches!(
        outcome.diagnostics[1],
        SearchDiagnostic::FollowGraphUnavailable(_)
    ));
}

#[tokio::test]
async fn fallback_with_failed_bare_search_skips_follow_graph() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(SearchPage::default())
            .push_search_error("timeout"),
    );
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", true, 50).await;

    assert!(outcome.is_empty());
    assert_eq!(backend.identity_calls(), 0);
    assert_eq!(outcome.diagnostics[0], SearchDiagnostic::ProbeEmpty);
    assert!(matches!(
        outcome.diagnostics[1],
        SearchDiagnostic::SearchFailed(_)
    ));
}

#[tokio::test]
async fn unrestricted_search_error_yields_empty_outcome() {
    let backend = Arc::new(ScriptedBackend::new().push_search_error("503"));
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", false, 50).await;

    assert!(outcome.is_empty());
    assert_eq!(backend.search_calls().len(), 1);
    assert!(matches!(
        outcome.diagnostics.as_slice(),
        [SearchDiagnostic::SearchFailed(_)]
    ));
}

#[tokio::test]
async fn limits_are_clamped_to_page_bounds() {
    let backend = Arc::new(ScriptedBackend::new());
    let resolver = resolver_for(&backend);

    resolver.resolve("AI", false, 500).await;
    resolver.resolve("AI", false, 0).await;
    resolver.resolve("AI", true, 3).await;

    assert_eq!(
        backend.search_calls(),
        vec![
            ("AI".to_string(), 100),
            // The endpoint needs at least 10 per page; the result is truncated locally.
            ("AI".to_string(), 10),
            ("AI from:following".to_string(), 10),
            ("AI".to_string(), 10),
        ]
    );
}

#[tokio::test]
async fn small_limit_truncates_results() {
    let backend = Arc::new(ScriptedBackend::new().push_search(ai_page()));
    let resolver = resolver_for(&backend);

    let outcome = resolver.resolve("AI", false, 1).await;

    assert_eq!(ids(&outcome.tweets), vec!["123456"]);
}

// MARK: Executor

#[tokio::test]
async fn executor_follows_cursors_until_limit() {
    let first = page(
        vec![
            raw_tweet("1", "a", "one"),
            raw_tweet("2", "b", "two"),
            raw_tweet("3", "a", "three"),
        ],
        vec![raw_user("a", "alice", false)],
        Some("c1"),
    );
    let second = page(
        vec![
            raw_tweet("4", "b", "four"),
            raw_tweet("5", "a", "five"),
            raw_tweet("6", "b", "six"),
        ],
        vec![raw_user("b", "bob", true)],
        Some("c2"),
    );
    let backend = Arc::new(ScriptedBackend::new().push_search(first).push_search(second));
    let executor = SearchExecutor::new(backend.clone());

    let tweets = executor.try_search("rust", 5).await.unwrap();

    assert_eq!(ids(&tweets), vec!["1", "2", "3", "4", "5"]);
    // Tweet 2 came before bob's record was seen, so it has no author.
    assert!(tweets[1].author.is_none());
    assert_eq!(
        tweets[3].author.as_ref().and_then(|a| a.username.as_deref()),
        Some("bob")
    );
    assert_eq!(
        backend.calls(),
        vec![
            Call::Search {
                query: "rust".to_string(),
                page_size: 10,
                cursor: None,
            },
            Call::Search {
                query: "rust".to_string(),
                page_size: 10,
                cursor: Some("c1".to_string()),
            },
        ]
    );
}

#[tokio::test]
async fn executor_stops_when_no_more_pages() {
    let only = page(vec![raw_tweet("1", "a", "one")], vec![], None);
    let backend = Arc::new(ScriptedBackend::new().push_search(only));
    let executor = SearchExecutor::new(backend.clone());

    let outcome = executor.search("rust", 50).await;

    assert_eq!(ids(&outcome.tweets), vec!["1"]);
    assert_eq!(backend.search_calls().len(), 1);
    assert!(outcome.diagnostics.is_empty());
}

#[tokio::test]
async fn executor_error_mid_pagination_discards_partial_results() {
    let first = page(vec![raw_tweet("1", "a", "one")], vec![], Some("c1"));
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_search(first)
            .push_search_error("connection reset"),
    );
    let executor = SearchExecutor::new(backend.clone());

    let outcome = executor.search("rust", 50).await;

    assert!(outcome.is_empty());
    assert!(matches!(
        outcome.diagnostics.as_slice(),
        [SearchDiagnostic::SearchFailed(detail)] if detail.contains("connection reset")
    ));
}

// MARK: Normalizer

#[test]
fn normalizes_tweet_with_author_and_metrics() {
    let mut authors = HashMap::new();
    authors.insert("1001".to_string(), raw_user("1001", "user1", true));

    let tweet = NormalizedTweet::from_raw(raw_tweet("42", "1001", "hello"), &authors);

    assert_eq!(tweet.id, "42");
    assert_eq!(tweet.text, "hello");
    assert_eq!(tweet.permalink, "https://twitter.com/i/status/42");
    assert_eq!(
        tweet.created_at.map(|d| d.to_rfc3339()),
        Some("2024-01-01T10:00:00+00:00".to_string())
    );
    assert_eq!(tweet.metrics.get("like_count"), Some(&5));
    let author = tweet.author.unwrap();
    assert_eq!(author.username.as_deref(), Some("user1"));
    assert_eq!(author.display_name.as_deref(), Some("Name of user1"));
    assert_eq!(author.verified, Some(true));
}

#[test]
fn normalizes_sparse_tweet_without_failing() {
    let raw = RawTweet {
        id: "7".to_string(),
        text: "bare".to_string(),
        created_at: Some("yesterday".to_string()),
        author_id: Some("404".to_string()),
        public_metrics: None,
    };

    let tweet = NormalizedTweet::from_raw(raw, &HashMap::new());

    assert_eq!(tweet.id, "7");
    assert!(tweet.created_at.is_none());
    assert!(tweet.author.is_none());
    assert_eq!(tweet.author_id.as_deref(), Some("404"));
    assert!(tweet.metrics.is_empty());
}

#[test]
fn normalized_tweet_serializes_with_stored_field_names() {
    let mut authors = HashMap::new();
    authors.insert("1001".to_string(), raw_user("1001", "user1", false));
    let tweet = NormalizedTweet::from_raw(raw_tweet("42", "1001", "hello"), &authors);

    let value = serde_json::to_value(&tweet).unwrap();

    assert_eq!(value["url"], "https://twitter.com/i/status/42");
    assert_eq!(value["author"]["name"], "Name of user1");
    assert_eq!(value["public_metrics"]["retweet_count"], 2);

    let back: NormalizedTweet = serde_json::from_value(value).unwrap();
    assert_eq!(back, tweet);
}

// MARK: Following filter

#[test]
fn filter_keeps_followed_authors_in_order() {
    let tweets = vec![
        tweet("1", Some("a")),
        tweet("2", Some("b")),
        tweet("3", None),
        tweet("4", Some("a")),
        tweet("5", Some("c")),
    ];

    let filtered = filter_by_following(tweets, &follow_set(&["a", "c"]));

    assert_eq!(ids(&filtered), vec!["1", "4", "5"]);
}

#[tokio::test]
async fn filter_fails_open_when_account_follows_nobody() {
    let backend = Arc::new(ScriptedBackend::new().with_following(&[&[]]));
    let cache = cache_for(&backend, 5000);
    let tweets = vec![tweet("1", Some("a")), tweet("2", Some("b"))];

    let (filtered, diagnostic) = cache.filter(tweets.clone()).await;

    assert_eq!(filtered, tweets);
    assert_eq!(diagnostic, Some(SearchDiagnostic::FollowGraphEmpty));
}

#[tokio::test]
async fn filter_fails_open_when_population_fails() {
    let backend = Arc::new(ScriptedBackend::new().push_identity_error("outage"));
    let cache = cache_for(&backend, 5000);
    let tweets = vec![tweet("1", Some("1001")), tweet("2", Some("1002"))];

    let (filtered, diagnostic) = cache.filter(tweets.clone()).await;

    assert_eq!(filtered, tweets);
    assert!(matches!(
        diagnostic,
        Some(SearchDiagnostic::FollowGraphUnavailable(ref detail)) if detail.contains("outage")
    ));
}

// MARK: Follow-graph cache

#[tokio::test]
async fn cache_populates_once_until_invalidated() {
    let backend = Arc::new(ScriptedBackend::new().with_following(&[&["1001", "1002", "1003"]]));
    let cache = cache_for(&backend, 5000);

    let first = cache.followed_ids().await;
    let second = cache.followed_ids().await;

    let expected: HashSet<String> = ["1001", "1002", "1003"].iter().map(|s| s.to_string()).collect();
    assert_eq!(first.followed_ids, expected);
    assert_eq!(first, second);
    assert_eq!(first.owner_id, OWNER_ID);
    assert_eq!(backend.identity_calls(), 1);

    cache.invalidate().await;
    let third = cache.followed_ids().await;

    assert_eq!(third.followed_ids, expected);
    assert_eq!(backend.identity_calls(), 2);
}

#[tokio::test]
async fn failed_population_is_not_cached() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .push_identity_error("outage")
            .with_following(&[&["1001"]]),
    );
    let cache = cache_for(&backend, 5000);

    let failed = cache.followed_ids().await;
    assert!(failed.is_empty());

    let recovered = cache.followed_ids().await;
    assert!(recovered.contains("1001"));
    assert_eq!(backend.identity_calls(), 2);
}

#[tokio::test]
async fn population_paginates_and_respects_cap() {
    let pages: &[&[&str]] = &[&["1", "2", "3"], &["4", "5"]];

    let backend = Arc::new(ScriptedBackend::new().with_following(pages));
    let full = cache_for(&backend, 5000).followed_ids().await;
    assert_eq!(full.followed_ids.len(), 5);
    let cursors: Vec<Option<String>> = backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Following { cursor, .. } => Some(cursor),
            _ => None,
        })
        .collect();
    assert_eq!(cursors, vec![None, Some("page-1".to_string())]);

    let capped_backend = Arc::new(ScriptedBackend::new().with_following(pages));
    let capped = cache_for(&capped_backend, 2).followed_ids().await;
    assert_eq!(capped.followed_ids.len(), 2);
    // The cap is reached on the first page, so the second is never requested.
    assert_eq!(capped_backend.calls().len(), 2);
}

#[tokio::test]
async fn concurrent_first_access_populates_once() {
    let backend = Arc::new(ScriptedBackend::new().with_following(&[&["1001"]]));
    let cache = cache_for(&backend, 5000);

    let (a, b) = tokio::join!(cache.snapshot(), cache.snapshot());

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(backend.identity_calls(), 1);
}
