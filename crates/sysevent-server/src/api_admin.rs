//! Admin API handlers for the system logs.
//!
//! Provides:
//! - `POST /api/admin/flush-logs`: flush every log and wait (`SYSTEM FLUSH LOGS`)
//! - `GET /api/admin/logs`: per-log queue and watermark statistics
//! - `GET /api/admin/logs/{table}/events`: recently persisted records

use crate::{api::ApiError, AppState};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysevent_db::DbPool;
use sysevent_log::{FlushReport, LogStats, PersistedRow};
use thiserror::Error;
use uuid::Uuid;

/// Response body for `POST /api/admin/flush-logs`.
#[derive(Debug, Serialize)]
pub struct FlushLogsResponse {
    /// `"ok"` when every log reached its target, `"incomplete"` otherwise.
    pub status: &'static str,
    /// Identifier shared by this request's `flush_history` rows.
    pub request_id: String,
    pub logs: Vec<FlushReport>,
}

/// Response body for `GET /api/admin/logs`.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogStats>,
    pub count: usize,
}

/// Query parameters for `GET /api/admin/logs/{table}/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Maximum number of rows to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

/// Response body for `GET /api/admin/logs/{table}/events`.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub table: String,
    /// Persisted rows, oldest first.
    pub events: Vec<PersistedRow>,
    pub count: usize,
}

#[derive(Debug, Error)]
enum HistoryError {
    #[error("db connection failed: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("db write failed: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Handler for `POST /api/admin/flush-logs`.
///
/// Requests a forced flush on every enabled log, then blocks (on a worker
/// thread) until each one has persisted everything submitted before the
/// request. Responds `200` when all logs completed and `500` with the same
/// per-log report when any of them did not.
pub async fn flush_logs_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    let logs = state.logs.clone();
    let pool = state.pool.clone();
    let request_id_clone = request_id.clone();

    let reports = tokio::task::spawn_blocking(move || {
        let reports = logs.flush_all(true);
        if let Err(e) = record_flush_history(&pool, &request_id_clone, &reports) {
            tracing::warn!(request_id = %request_id_clone, error = %e, "failed to record flush history");
        }
        reports
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?;

    let incomplete: Vec<&str> = reports
        .iter()
        .filter(|report| !report.outcome.complete)
        .map(|report| report.table)
        .collect();

    let (status, label) = if incomplete.is_empty() {
        tracing::info!(request_id = %request_id, logs = reports.len(), "flushed system logs");
        (StatusCode::OK, "ok")
    } else {
        tracing::error!(
            request_id = %request_id,
            incomplete = ?incomplete,
            "system logs did not reach their flush targets"
        );
        (StatusCode::INTERNAL_SERVER_ERROR, "incomplete")
    };

    let body = FlushLogsResponse {
        status: label,
        request_id,
        logs: reports,
    };
    Ok((status, Json(body)).into_response())
}

fn record_flush_history(
    pool: &DbPool,
    request_id: &str,
    reports: &[FlushReport],
) -> Result<(), HistoryError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO flush_history (request_id, log_name, target, flushed_up_to, complete)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for report in reports {
            stmt.execute(rusqlite::params![
                request_id,
                report.name,
                report.outcome.target as i64,
                report.outcome.flushed_up_to as i64,
                report.outcome.complete,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Handler for `GET /api/admin/logs`.
pub async fn list_logs_handler(Extension(state): Extension<Arc<AppState>>) -> Json<LogsResponse> {
    let logs = state.logs.stats();
    let count = logs.len();
    Json(LogsResponse { logs, count })
}

/// Handler for `GET /api/admin/logs/{table}/events`.
///
/// Returns `404` for tables that are unknown or disabled in configuration.
pub async fn get_log_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let log = state
        .logs
        .get(&table)
        .ok_or_else(|| ApiError::NotFound(format!("system log not found: {}", table)))?;

    let limit = params.limit.unwrap_or(100).clamp(1, 1000) as usize;

    let events = tokio::task::spawn_blocking(move || log.recent_events(limit))
        .await
        .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    let count = events.len();
    Ok(Json(EventsResponse {
        table,
        events,
        count,
    }))
}
