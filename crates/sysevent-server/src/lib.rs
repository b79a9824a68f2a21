//! System log server library logic.
//!
//! Hosts the system logs of one engine instance behind a small admin API:
//! flush every log and wait, inspect queue statistics, and read back what was
//! persisted.

pub mod api;
pub mod api_admin;
pub mod config;
pub mod text_log;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use sysevent_db::DbPool;
use sysevent_log::SystemLogs;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Every enabled system log.
    pub logs: Arc<SystemLogs>,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/admin/flush-logs",
            post(api_admin::flush_logs_handler),
        )
        .route("/api/admin/logs", get(api_admin::list_logs_handler))
        .route(
            "/api/admin/logs/{table}/events",
            get(api_admin::get_log_events_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
