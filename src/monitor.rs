//! The monitoring cycle: search, summarize, store.
//!
//! [`Monitor`] ties the search resolver, the summarizer and the store
//! together. The daily job calls [`Monitor::run_active_terms`]; the REST API
//! calls [`Monitor::run_keyword`] for on-demand runs.

use log::{error, info};
use serde::Serialize;
use std::sync::Arc;

use crate::config::MonitorSettings;
use crate::db::{DbResult, MonitorStore, MonitoredTerm, NewResult};
use crate::llm::Summarizer;
use crate::twitter::{FollowingResolver, FollowingStrategy, SearchDiagnostic, SearchQuery};

/// Summary returned for an on-demand run that found nothing.
pub const NO_TWEETS_FOR_KEYWORD: &str = "No tweets found for this keyword.";

/// What happened to a single term during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOutcome {
    /// A result was stored.
    Stored,
    /// The search came back empty; nothing was stored.
    NoTweets,
}

/// Counters for one pass over the active terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub processed: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Response of an on-demand keyword run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub summary: String,
    pub tweet_count: usize,
    pub keyword: String,
    pub strategy: FollowingStrategy,
    pub diagnostics: Vec<SearchDiagnostic>,
}

/// Runs monitoring passes over the stored terms.
pub struct Monitor {
    resolver: FollowingResolver,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn MonitorStore>,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        resolver: FollowingResolver,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<dyn MonitorStore>,
        settings: MonitorSettings,
    ) -> Self {
        Monitor {
            resolver,
            summarizer,
            store,
            settings,
        }
    }

    pub fn resolver(&self) -> &FollowingResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn MonitorStore> {
        &self.store
    }

    /// Searches, summarizes and stores one term.
    ///
    /// When the search finds no tweets nothing is stored and
    /// [`TermOutcome::NoTweets`] is returned.
    ///
    /// # Returns
    ///
    /// - `Ok(TermOutcome)`: What happened to the term
    /// - `Err(Box<dyn std::error::Error + Send + Sync>)`: If the result could not be stored
    pub async fn process_term(&self, term: &MonitoredTerm) -> DbResult<TermOutcome> {
        info!("Processing term: {}", term.keyword);

        let query = SearchQuery::new(
            term.keyword.as_str(),
            term.restrict_following,
            self.settings.max_results,
        );
        let outcome = self.resolver.resolve_query(&query).await;

        if outcome.is_empty() {
            info!("No tweets found for {}", term.keyword);
            return Ok(TermOutcome::NoTweets);
        }

        let summary = self
            .summarizer
            .summarize(&outcome.tweets, &term.keyword)
            .await;
        let tweet_count = outcome.len();

        self.store
            .create_result(NewResult {
                keyword_id: term.id,
                tweets: outcome.tweets,
                summary,
            })
            .await?;

        info!("Processed {} tweets for {}", tweet_count, term.keyword);
        Ok(TermOutcome::Stored)
    }

    /// Processes every active term in order.
    ///
    /// A failing term is logged and counted; the remaining terms still run.
    pub async fn run_active_terms(&self) -> DbResult<CycleReport> {
        info!("Starting monitoring run over active terms");

        let terms = self.store.active_terms().await?;
        info!("Processing {} active terms", terms.len());

        let mut report = CycleReport::default();
        for term in &terms {
            report.processed += 1;
            match self.process_term(term).await {
                Ok(TermOutcome::Stored) => report.stored += 1,
                Ok(TermOutcome::NoTweets) => {}
                Err(e) => {
                    error!("Error processing term {}: {}", term.keyword, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Monitoring run completed: {} processed, {} stored, {} failed",
            report.processed, report.stored, report.failed
        );
        Ok(report)
    }

    /// Runs an on-demand search and summary for `keyword`.
    ///
    /// The result is stored only when a monitored term with exactly this
    /// keyword exists.
    pub async fn run_keyword(&self, keyword: &str, restrict_following: bool) -> DbResult<RunSummary> {
        info!("Manual run for '{}'", keyword);

        let outcome = self
            .resolver
            .resolve(keyword, restrict_following, self.settings.max_results)
            .await;

        if outcome.is_empty() {
            return Ok(RunSummary {
                summary: NO_TWEETS_FOR_KEYWORD.to_string(),
                tweet_count: 0,
                keyword: keyword.to_string(),
                strategy: outcome.strategy,
                diagnostics: outcome.diagnostics,
            });
        }

        let summary = self.summarizer.summarize(&outcome.tweets, keyword).await;
        let tweet_count = outcome.len();

        if let Some(term) = self.store.find_term_by_keyword(keyword).await? {
            self.store
                .create_result(NewResult {
                    keyword_id: term.id,
                    tweets: outcome.tweets,
                    summary: summary.clone(),
                })
                .await?;
        } else {
            info!("'{}' is not a monitored term, result not stored", keyword);
        }

        Ok(RunSummary {
            summary,
            tweet_count,
            keyword: keyword.to_string(),
            strategy: outcome.strategy,
            diagnostics: outcome.diagnostics,
        })
    }
}
