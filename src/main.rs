//! # xmonitor
//!
//! A Rust web service that monitors keywords on Twitter/X and stores LLM
//! summaries of the matching tweets.
//!
//! ## Environment Variables
//!
//! See the library documentation for the full list. At minimum:
//! - `xapi_access_token`: Twitter API Access token (OAuth 2.0 User Context for v2 endpoints)
//! - `DATABASE_URL`: PostgreSQL connection string
//! - `DEEPSEEK_API_KEY`: LLM API key
//! - `PORT`: Server port (defaults to 3000)

use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;

use xmonitor::twitter::SocialBackend;
use xmonitor::{
    build_router, ensure_schema, get_db_pool, start_monitor_cronjob, AppConfig, AppState,
    DeepSeekSummarizer, FollowGraphCache, FollowGraphSettings, FollowingResolver, Monitor,
    MonitorStore, PgStore, SearchExecutor, Summarizer, XApiClient,
};

/// Main entry point for the xmonitor web service.
///
/// Loads the configuration, connects to the database, wires the search
/// pipeline, starts the daily scheduler and serves the REST API until the
/// process is terminated.
///
/// # Example Usage
///
/// ```bash
/// # Run with debug logging
/// RUST_LOG=debug cargo run
/// ```
#[tokio::main]
async fn main() {
    // Initialize the logging system
    env_logger::init();

    if let Err(e) = run().await {
        error!("xmonitor failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;

    let pool = get_db_pool(&config.database_url).await?;
    ensure_schema(&pool).await?;
    let store: Arc<dyn MonitorStore> = Arc::new(PgStore::new(pool));

    let backend: Arc<dyn SocialBackend> = Arc::new(XApiClient::new(&config.twitter)?);
    let follow_graph = Arc::new(FollowGraphCache::new(
        Arc::clone(&backend),
        FollowGraphSettings {
            cap: config.monitor.following_cap,
            ..FollowGraphSettings::default()
        },
    ));
    let resolver = FollowingResolver::new(SearchExecutor::new(backend), follow_graph);
    let summarizer: Arc<dyn Summarizer> = Arc::new(DeepSeekSummarizer::new(&config.llm)?);

    let monitor = Arc::new(Monitor::new(
        resolver,
        summarizer,
        store,
        config.monitor.clone(),
    ));

    // The scheduler runs its jobs on background tasks; keep it alive for the server's lifetime.
    let scheduler = start_monitor_cronjob(Arc::clone(&monitor), &config.monitor).await?;
    scheduler.start().await?;
    info!("Daily monitoring scheduler started");

    let app = build_router(AppState::new(monitor));

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Starting xmonitor server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    let mut scheduler = scheduler;
    if let Err(e) = scheduler.shutdown().await {
        error!("Failed to stop scheduler: {}", e);
    }
    info!("Scheduler stopped");
    Ok(())
}
