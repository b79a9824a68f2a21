//! System log server binary.
//!
//! Opens the database, starts one flush thread per enabled system log, serves
//! the admin API, and on SIGTERM/SIGINT stops HTTP before shutting the logs
//! down so every queue gets its final flush.

use std::net::SocketAddr;
use std::sync::Arc;
use sysevent_log::SystemLogs;
use sysevent_server::text_log::{self, TextLogLayer};
use sysevent_server::{app, config, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::util::SubscriberInitExt;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SYSEVENT_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration: the server cannot start without valid config");

    // Initialize tracing; the text log layer attaches once the logs exist.
    let text_log_layer = TextLogLayer::new(config.logging.text_log_level());
    text_log::subscriber(&config.logging, &text_log_layer).init();

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = sysevent_db::create_pool(&config.database.path, config.database.runtime_settings())
        .expect("failed to create database pool: check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            sysevent_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Build and start the system logs
    for table in config.system_logs.unknown_disabled() {
        tracing::warn!(table, "ignoring unknown system log in system_logs.disabled");
    }
    let settings = config.system_logs.to_log_settings();
    let logs = Arc::new(SystemLogs::new(
        &pool,
        settings,
        &config.system_logs.disabled,
    ));
    if let Some(text_log) = &logs.text_log {
        text_log_layer.attach(text_log.clone());
    }
    logs.startup_all();
    tracing::info!(
        logs = logs.all().len(),
        capacity = settings.capacity(),
        flush_interval_ms = settings.flush_interval().as_millis() as u64,
        flush_threshold = settings.flush_threshold(),
        "started system logs"
    );

    // Build application
    let state = AppState {
        pool,
        logs: logs.clone(),
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting sysevent server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address: is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Joining flush threads blocks, keep it off the async workers.
    match tokio::task::spawn_blocking(move || logs.shutdown_all()).await {
        Ok(()) => tracing::info!("system logs shut down"),
        Err(e) => tracing::error!(error = %e, "system log shutdown task failed"),
    }

    tracing::info!("sysevent server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
