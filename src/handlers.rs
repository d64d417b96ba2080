//! HTTP route handlers for the xmonitor service.
//!
//! This module contains the REST API: monitored term management, stored
//! results, on-demand runs and follow-graph cache control. All handlers share
//! an [`AppState`] holding the [`Monitor`].

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::cronjob::run_monitor_cycle;
use crate::db::{MonitoredTerm, NewTerm, ResultRecord, TermUpdate};
use crate::monitor::{Monitor, RunSummary};

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        AppState { monitor }
    }
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Builds the `{"status":"error",...}` body used by every failing handler.
fn error_response(status: StatusCode, message: &str, e: impl Display) -> ApiError {
    (
        status,
        Json(json!({"status": "error", "message": message, "error": e.to_string()})),
    )
}

fn internal_error(message: &str, e: impl Display) -> ApiError {
    error!("{}: {}", message, e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message, e)
}

fn not_found(message: &str) -> ApiError {
    warn!("{}", message);
    error_response(StatusCode::NOT_FOUND, message, "not found")
}

/// `skip`/`limit` query parameters for list endpoints.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
}

fn default_page_limit() -> u32 {
    100
}

/// Unwraps the pagination query, turning a rejection into the JSON error body.
fn pagination(query: Result<Query<Pagination>, QueryRejection>) -> Result<Pagination, ApiError> {
    match query {
        Ok(Query(page)) => Ok(page),
        Err(rejection) => {
            warn!("Rejected pagination parameters: {}", rejection.body_text());
            Err(error_response(
                StatusCode::BAD_REQUEST,
                "Invalid pagination parameters",
                rejection.body_text(),
            ))
        }
    }
}

/// Body of `POST /api/run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub keyword: String,
    #[serde(default)]
    pub restrict_following: bool,
}

/// Handles GET requests to the root `/` endpoint.
pub async fn handle_root() -> Json<Value> {
    Json(json!({"message": "X Monitor API is running"}))
}

/// Handles GET requests to the `/health` endpoint.
///
/// # Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "xmonitor"
/// }
/// ```
pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "xmonitor"}))
}

/// Handles `GET /api/terms`.
pub async fn handle_list_terms(
    State(state): State<AppState>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult<Vec<MonitoredTerm>> {
    let page = pagination(page)?;
    state
        .monitor
        .store()
        .list_terms(page.skip.into(), page.limit.into())
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to list terms", e))
}

/// Handles `POST /api/terms`.
///
/// # Error Response
///
/// 400 when the keyword is blank, 500 when the term cannot be stored.
pub async fn handle_create_term(
    State(state): State<AppState>,
    Json(mut term): Json<NewTerm>,
) -> ApiResult<MonitoredTerm> {
    term.keyword = term.keyword.trim().to_string();
    if term.keyword.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid term",
            "keyword cannot be empty",
        ));
    }

    state
        .monitor
        .store()
        .create_term(term)
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to create term", e))
}

/// Handles `PUT /api/terms/:id`; only the fields present in the body change.
pub async fn handle_update_term(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(mut update): Json<TermUpdate>,
) -> ApiResult<MonitoredTerm> {
    update.keyword = update.keyword.map(|keyword| keyword.trim().to_string());
    if update.keyword.as_deref().is_some_and(str::is_empty) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid term",
            "keyword cannot be empty",
        ));
    }

    match state.monitor.store().update_term(id, update).await {
        Ok(Some(term)) => Ok(Json(term)),
        Ok(None) => Err(not_found("Term not found")),
        Err(e) => Err(internal_error("Failed to update term", e)),
    }
}

/// Handles `DELETE /api/terms/:id`. The term's results are deleted with it.
pub async fn handle_delete_term(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Value> {
    match state.monitor.store().delete_term(id).await {
        Ok(true) => {
            info!("Deleted monitored term {}", id);
            Ok(Json(json!({"message": "Term deleted successfully"})))
        }
        Ok(false) => Err(not_found("Term not found")),
        Err(e) => Err(internal_error("Failed to delete term", e)),
    }
}

/// Handles `GET /api/results`, newest first.
pub async fn handle_list_results(
    State(state): State<AppState>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult<Vec<ResultRecord>> {
    let page = pagination(page)?;
    state
        .monitor
        .store()
        .list_results(page.skip.into(), page.limit.into())
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to list results", e))
}

/// Handles `GET /api/results/latest`: the newest result of each term.
pub async fn handle_latest_results(State(state): State<AppState>) -> ApiResult<Vec<ResultRecord>> {
    state
        .monitor
        .store()
        .latest_results()
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to list latest results", e))
}

/// Handles `GET /api/results/:id`, including the result's term.
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ResultRecord> {
    match state.monitor.store().get_result(id).await {
        Ok(Some(result)) => Ok(Json(result)),
        Ok(None) => Err(not_found("Result not found")),
        Err(e) => Err(internal_error("Failed to load result", e)),
    }
}

/// Handles `POST /api/run`: searches and summarizes a keyword right away.
///
/// # Success Response
///
/// ```json
/// {
///   "summary": "...",
///   "tweet_count": 12,
///   "keyword": "AI",
///   "strategy": "client_fallback",
///   "diagnostics": [{"kind": "probe_empty"}]
/// }
/// ```
pub async fn handle_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> ApiResult<RunSummary> {
    let keyword = request.keyword.trim();
    if keyword.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request",
            "keyword cannot be empty",
        ));
    }

    state
        .monitor
        .run_keyword(keyword, request.restrict_following)
        .await
        .map(Json)
        .map_err(|e| internal_error("Error processing request", e))
}

/// Handles `POST /api/run/all`: starts a pass over all active terms in the background.
pub async fn handle_run_all(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    info!("Manual monitoring run requested");
    tokio::spawn(run_monitor_cycle(Arc::clone(&state.monitor)));
    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "accepted", "message": "Monitoring run started"})),
    )
}

/// Handles `DELETE /api/following/cache`: the next restricted search refetches the follow graph.
pub async fn handle_clear_following_cache(State(state): State<AppState>) -> Json<Value> {
    state.monitor.resolver().follow_graph().invalidate().await;
    Json(json!({"status": "success", "message": "Following cache cleared"}))
}

/// Builds the HTTP application with all routes and middleware.
///
/// # Middleware
///
/// - Permissive CORS
/// - `X-Content-Type-Options: nosniff` on every response
/// - HTTP request tracing
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/terms", get(handle_list_terms).post(handle_create_term))
        .route(
            "/api/terms/:id",
            put(handle_update_term).delete(handle_delete_term),
        )
        .route("/api/results", get(handle_list_results))
        .route("/api/results/latest", get(handle_latest_results))
        .route("/api/results/:id", get(handle_get_result))
        .route("/api/run", post(handle_run))
        .route("/api/run/all", post(handle_run_all))
        .route("/api/following/cache", delete(handle_clear_following_cache))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        )
}
