//! Integration tests for the full set of system logs writing to a SQLite
//! database: registration, flushing all logs at once, disabling, and
//! shutdown.

use std::time::Duration;

use chrono::Utc;
use sysevent_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use sysevent_log::{LogSettings, SystemLogs, WorkerState};
use sysevent_types::{LogLevel, QueryKind, QueryLog, TextLog, ALL_RECORD_TABLES};

fn setup_pool(dir: &tempfile::TempDir) -> DbPool {
    let path = dir.path().join("system_logs.db");
    let pool = create_pool(
        path.to_str().expect("utf-8 path"),
        DbRuntimeSettings::default(),
    )
    .expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");
    run_migrations(&conn).expect("failed to run migrations");
    pool
}

fn settings() -> LogSettings {
    LogSettings::new(1024, Duration::from_secs(60))
}

fn query(id: &str) -> QueryLog {
    QueryLog {
        kind: QueryKind::QueryFinish,
        event_time: Utc::now(),
        query_id: id.to_string(),
        query: "SELECT 1".to_string(),
        user: "default".to_string(),
        query_duration_ms: 3,
        read_rows: 1,
        written_rows: 0,
        result_rows: 1,
        memory_usage: 4096,
        exception: None,
    }
}

fn text(message: &str) -> TextLog {
    TextLog {
        event_time: Utc::now(),
        thread_name: "test".to_string(),
        level: LogLevel::Information,
        query_id: String::new(),
        logger_name: "system_logs_test".to_string(),
        message: message.to_string(),
        source_file: None,
        source_line: None,
    }
}

fn count_rows(pool: &DbPool, table: &str) -> i64 {
    let conn = pool.get().expect("failed to get connection");
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("table should exist")
}

#[test]
fn registers_every_log_in_order() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = setup_pool(&dir);
    let logs = SystemLogs::new(&pool, settings(), &[]);

    let tables: Vec<&str> = logs.all().iter().map(|log| log.table_name()).collect();
    assert_eq!(tables, ALL_RECORD_TABLES);
    assert!(logs.get("query_log").is_some());
    assert!(logs.get("no_such_log").is_none());
}

#[test]
fn flush_all_persists_every_log_and_creates_tables() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = setup_pool(&dir);
    let logs = SystemLogs::new(&pool, settings(), &[]);
    logs.startup_all();

    let query_log = logs.query_log.as_ref().expect("query_log enabled");
    let text_log = logs.text_log.as_ref().expect("text_log enabled");
    query_log.add(query("q-1"));
    query_log.add(query("q-2"));
    text_log.add(text("hello"));

    let reports = logs.flush_all(true);
    assert_eq!(reports.len(), ALL_RECORD_TABLES.len());
    assert!(reports.iter().all(|report| report.outcome.complete));

    assert_eq!(count_rows(&pool, "query_log"), 2);
    assert_eq!(count_rows(&pool, "text_log"), 1);
    // Forced flush prepared the destination of logs that never saw a record.
    assert_eq!(count_rows(&pool, "crash_log"), 0);

    let catalogued: i64 = {
        let conn = pool.get().expect("failed to get connection");
        conn.query_row("SELECT COUNT(*) FROM system_log_tables", [], |row| {
            row.get(0)
        })
        .expect("catalog should exist")
    };
    assert_eq!(catalogued, ALL_RECORD_TABLES.len() as i64);

    let events = query_log.recent_events(10).expect("read back should succeed");
    let ids: Vec<&str> = events
        .iter()
        .map(|row| row.payload["query_id"].as_str().expect("query_id"))
        .collect();
    assert_eq!(ids, vec!["q-1", "q-2"]);

    logs.shutdown_all();
}

#[test]
fn disabled_logs_are_not_built() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = setup_pool(&dir);
    let disabled = vec!["trace_log".to_string(), "query_thread_log".to_string()];
    let logs = SystemLogs::new(&pool, settings(), &disabled);

    assert!(logs.trace_log.is_none());
    assert!(logs.query_thread_log.is_none());
    assert!(logs.get("trace_log").is_none());
    assert_eq!(logs.all().len(), ALL_RECORD_TABLES.len() - 2);
}

#[test]
fn shutdown_all_flushes_pending_records_and_stops_every_log() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = setup_pool(&dir);
    let logs = SystemLogs::new(&pool, settings(), &[]);
    logs.startup_all();

    let query_log = logs.query_log.as_ref().expect("query_log enabled");
    for i in 0..10 {
        query_log.add(query(&format!("q-{i}")));
    }

    logs.shutdown_all();
    logs.shutdown_all();

    assert_eq!(count_rows(&pool, "query_log"), 10);
    for stats in logs.stats() {
        assert_eq!(stats.state, WorkerState::ShutDown, "{}", stats.table);
        assert_eq!(stats.buffered, 0, "{}", stats.table);
    }

    let reports = logs.flush_all(false);
    assert!(reports.iter().all(|report| report.outcome.complete));
}
