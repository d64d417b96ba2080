//! # xmonitor Library
//!
//! A Rust web service library that monitors keywords on Twitter/X, summarizes
//! the matching tweets with an LLM and stores the summaries in PostgreSQL.
//! Searches can be restricted to accounts the authenticated user follows; the
//! service probes whether the API honors `from:following` and falls back to
//! filtering against a cached follow graph when it does not.
//!
//! ## Features
//!
//! - Paginated keyword search over the X API v2 recent-search endpoint
//! - Following restriction with server-side probe and client-side fallback
//! - Daily scheduled monitoring of active terms
//! - DeepSeek summaries of collected tweets
//! - REST API for terms, results and on-demand runs
//!
//! ## Configuration
//!
//! - `xapi_access_token`: OAuth 2.0 User Context access token (required)
//! - `xapi_refresh_token`, `xapi_client_id`, `xapi_client_secret`: enable token refresh
//! - `DATABASE_URL`: PostgreSQL connection string
//! - `DEEPSEEK_API_KEY`: LLM API key
//! - `PORT`: Server port (defaults to 3000)
//!
//! ## API Endpoints
//!
//! - `GET /`, `GET /health`
//! - `GET/POST /api/terms`, `PUT/DELETE /api/terms/:id`
//! - `GET /api/results`, `GET /api/results/latest`, `GET /api/results/:id`
//! - `POST /api/run`, `POST /api/run/all`
//! - `DELETE /api/following/cache`

pub mod config;
pub mod cronjob;
pub mod db;
pub mod handlers;
pub mod llm;
pub mod monitor;
pub mod oauth;
pub mod twitter;

// Re-export commonly used types and functions
pub use config::{AppConfig, ConfigError, LlmConfig, MonitorSettings, TwitterConfig};
pub use cronjob::{run_monitor_cycle, start_monitor_cronjob};
pub use db::{ensure_schema, get_db_pool, MonitorStore, PgStore};
pub use handlers::{build_router, AppState};
pub use llm::{DeepSeekSummarizer, Summarizer};
pub use monitor::{CycleReport, Monitor, RunSummary};
pub use oauth::build_oauth2_user_context_header;
pub use twitter::{
    FollowGraphCache, FollowGraphSettings, FollowingResolver, SearchExecutor, SearchOutcome,
    XApiClient,
};
