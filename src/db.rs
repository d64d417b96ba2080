//! Database module for monitored terms and their summaries.
//!
//! This module stores the keywords being monitored and the results of each
//! monitoring run (the raw tweets plus the LLM summary) in PostgreSQL. The
//! [`MonitorStore`] trait is what the monitoring cycle and the HTTP handlers
//! depend on; [`PgStore`] is the PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::config::mask_secret;
use crate::twitter::NormalizedTweet;

/// Result type used by the persistence layer.
pub type DbResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A keyword that the daily job searches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredTerm {
    pub id: i32,
    pub keyword: String,
    pub restrict_following: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Body of a create request for a monitored term.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTerm {
    pub keyword: String,
    #[serde(default)]
    pub restrict_following: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Partial update of a monitored term; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TermUpdate {
    pub keyword: Option<String>,
    pub restrict_following: Option<bool>,
    pub active: Option<bool>,
}

impl TermUpdate {
    /// Applies the present fields to `term`.
    pub fn apply_to(&self, term: &mut MonitoredTerm) {
        if let Some(keyword) = &self.keyword {
            term.keyword = keyword.clone();
        }
        if let Some(restrict_following) = self.restrict_following {
            term.restrict_following = restrict_following;
        }
        if let Some(active) = self.active {
            term.active = active;
        }
    }
}

/// One stored monitoring result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: i32,
    pub keyword_id: i32,
    pub tweets_raw: Value,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    /// The term the result belongs to; only filled when a single result is fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitored_term: Option<MonitoredTerm>,
}

/// A result about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub keyword_id: i32,
    pub tweets: Vec<NormalizedTweet>,
    pub summary: String,
}

/// Storage operations used by the monitoring cycle and the REST API.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Lists terms in id order, skipping `skip` and returning at most `limit`.
    async fn list_terms(&self, skip: i64, limit: i64) -> DbResult<Vec<MonitoredTerm>>;

    async fn get_term(&self, id: i32) -> DbResult<Option<MonitoredTerm>>;

    /// Lists the terms the scheduled run processes.
    async fn active_terms(&self) -> DbResult<Vec<MonitoredTerm>>;

    /// Finds the first term whose keyword matches exactly.
    async fn find_term_by_keyword(&self, keyword: &str) -> DbResult<Option<MonitoredTerm>>;

    async fn create_term(&self, term: NewTerm) -> DbResult<MonitoredTerm>;

    /// Returns `None` when no term has this id.
    async fn update_term(&self, id: i32, update: TermUpdate) -> DbResult<Option<MonitoredTerm>>;

    /// Deletes a term and its results; returns false when no term has this id.
    async fn delete_term(&self, id: i32) -> DbResult<bool>;

    /// Lists results newest first.
    async fn list_results(&self, skip: i64, limit: i64) -> DbResult<Vec<ResultRecord>>;

    /// The most recent result of every term that has one.
    async fn latest_results(&self) -> DbResult<Vec<ResultRecord>>;

    /// Fetches one result together with its term.
    async fn get_result(&self, id: i32) -> DbResult<Option<ResultRecord>>;

    async fn create_result(&self, result: NewResult) -> DbResult<ResultRecord>;
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// # Parameters
///
/// - `database_url`: The PostgreSQL connection string
///
/// # Returns
///
/// - `Ok(PgPool)`: A connection pool to the database
/// - `Err(Box<dyn std::error::Error + Send + Sync>)`: If the connection fails
pub async fn get_db_pool(database_url: &str) -> DbResult<PgPool> {
    info!("Connecting to PostgreSQL database");
    debug!("Database URL (masked): {}", mask_secret(database_url));

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    info!("Successfully connected to PostgreSQL database");

    Ok(pool)
}

/// Creates the tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> DbResult<()> {
    info!("Ensuring database schema");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS monitored_terms (
            id SERIAL PRIMARY KEY,
            keyword TEXT NOT NULL,
            restrict_following BOOLEAN NOT NULL DEFAULT FALSE,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_monitored_terms_keyword
        ON monitored_terms (keyword)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id SERIAL PRIMARY KEY,
            keyword_id INTEGER NOT NULL REFERENCES monitored_terms (id) ON DELETE CASCADE,
            tweets_raw JSONB NOT NULL DEFAULT '[]'::jsonb,
            summary TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_results_keyword_created
        ON results (keyword_id, created_at DESC)
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema is ready");
    Ok(())
}

fn term_from_row(row: &PgRow) -> Result<MonitoredTerm, sqlx::Error> {
    Ok(MonitoredTerm {
        id: row.try_get("id")?,
        keyword: row.try_get("keyword")?,
        restrict_following: row.try_get("restrict_following")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<ResultRecord, sqlx::Error> {
    let Json(tweets_raw): Json<Value> = row.try_get("tweets_raw")?;
    Ok(ResultRecord {
        id: row.try_get("id")?,
        keyword_id: row.try_get("keyword_id")?,
        tweets_raw,
        summary: row.try_get("summary")?,
        created_at: row.try_get("created_at")?,
        monitored_term: None,
    })
}

/// [`MonitorStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl MonitorStore for PgStore {
    async fn list_terms(&self, skip: i64, limit: i64) -> DbResult<Vec<MonitoredTerm>> {
        debug!("Listing monitored terms (skip {}, limit {})", skip, limit);

        let rows = sqlx::query(
            r#"
            SELECT id, keyword, restrict_following, active, created_at
            FROM monitored_terms
            ORDER BY id
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let terms = rows.iter().map(term_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(terms)
    }

    async fn get_term(&self, id: i32) -> DbResult<Option<MonitoredTerm>> {
        let row = sqlx::query(
            r#"
            SELECT id, keyword, restrict_following, active, created_at
            FROM monitored_terms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(term_from_row).transpose()?)
    }

    async fn active_terms(&self) -> DbResult<Vec<MonitoredTerm>> {
        info!("Querying database for active monitored terms");

        let rows = sqlx::query(
            r#"
            SELECT id, keyword, restrict_following, active, created_at
            FROM monitored_terms
            WHERE active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let terms = rows.iter().map(term_from_row).collect::<Result<Vec<_>, _>>()?;
        info!("Found {} active monitored terms", terms.len());
        Ok(terms)
    }

    async fn find_term_by_keyword(&self, keyword: &str) -> DbResult<Option<MonitoredTerm>> {
        let row = sqlx::query(
            r#"
            SELECT id, keyword, restrict_following, active, created_at
            FROM monitored_terms
            WHERE keyword = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(term_from_row).transpose()?)
    }

    async fn create_term(&self, term: NewTerm) -> DbResult<MonitoredTerm> {
        info!("Storing new monitored term '{}'", term.keyword);

        let row = sqlx::query(
            r#"
            INSERT INTO monitored_terms (keyword, restrict_following, active, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, keyword, restrict_following, active, created_at
            "#,
        )
        .bind(&term.keyword)
        .bind(term.restrict_following)
        .bind(term.active)
        .fetch_one(&self.pool)
        .await?;

        let created = term_from_row(&row)?;
        info!("Created monitored term {} ('{}')", created.id, created.keyword);
        Ok(created)
    }

    async fn update_term(&self, id: i32, update: TermUpdate) -> DbResult<Option<MonitoredTerm>> {
        info!("Updating monitored term {}", id);

        let row = sqlx::query(
            r#"
            UPDATE monitored_terms SET
                keyword = COALESCE($2, keyword),
                restrict_following = COALESCE($3, restrict_following),
                active = COALESCE($4, active)
            WHERE id = $1
            RETURNING id, keyword, restrict_following, active, created_at
            "#,
        )
        .bind(id)
        .bind(update.keyword)
        .bind(update.restrict_following)
        .bind(update.active)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            warn!("Monitored term {} not found for update", id);
        }
        Ok(row.as_ref().map(term_from_row).transpose()?)
    }

    async fn delete_term(&self, id: i32) -> DbResult<bool> {
        info!("Deleting monitored term {}", id);

        let result = sqlx::query("DELETE FROM monitored_terms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_results(&self, skip: i64, limit: i64) -> DbResult<Vec<ResultRecord>> {
        debug!("Listing results (skip {}, limit {})", skip, limit);

        let rows = sqlx::query(
            r#"
            SELECT id, keyword_id, tweets_raw, summary, created_at
            FROM results
            ORDER BY created_at DESC, id DESC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let results = rows.iter().map(result_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    async fn latest_results(&self) -> DbResult<Vec<ResultRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (keyword_id) id, keyword_id, tweets_raw, summary, created_at
            FROM results
            ORDER BY keyword_id, created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let results = rows.iter().map(result_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    async fn get_result(&self, id: i32) -> DbResult<Option<ResultRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, keyword_id, tweets_raw, summary, created_at
            FROM results
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut result = result_from_row(&row)?;
        result.monitored_term = self.get_term(result.keyword_id).await?;
        Ok(Some(result))
    }

    async fn create_result(&self, result: NewResult) -> DbResult<ResultRecord> {
        info!(
            "Storing result for term {} with {} tweets",
            result.keyword_id,
            result.tweets.len()
        );

        let row = sqlx::query(
            r#"
            INSERT INTO results (keyword_id, tweets_raw, summary, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, keyword_id, tweets_raw, summary, created_at
            "#,
        )
        .bind(result.keyword_id)
        .bind(Json(&result.tweets))
        .bind(&result.summary)
        .fetch_one(&self.pool)
        .await?;

        let stored = result_from_row(&row)?;
        info!("Successfully stored result {}", stored.id);
        Ok(stored)
    }
}
