//! Durable destinations for drained batches.
//!
//! The flush worker is the only caller of a sink's write path. It calls
//! [`LogSink::ensure_destination_exists`] once at startup (and again when a
//! flush is forced) and [`LogSink::persist_batch`] once per non-empty drain,
//! never while holding the queue lock.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use sysevent_db::DbPool;
use sysevent_types::LogRecord;

use crate::error::SinkError;

/// Storage collaborator for one record schema.
pub trait LogSink<R>: Send + Sync + 'static {
    /// Creates (or migrates) the destination so that batches can be written.
    fn ensure_destination_exists(&self) -> Result<(), SinkError>;

    /// Durably writes a batch in order. A failed batch is not retried.
    fn persist_batch(&self, records: &[R]) -> Result<(), SinkError>;

    /// Reads back up to `limit` of the most recently persisted rows, oldest
    /// first. Sinks without a read path return nothing.
    fn query_recent(&self, _limit: usize) -> Result<Vec<PersistedRow>, SinkError> {
        Ok(Vec::new())
    }
}

/// A persisted record as read back from storage.
#[derive(Debug, Clone, Serialize)]
pub struct PersistedRow {
    /// Row id in the destination table.
    pub id: i64,
    /// RFC 3339 event timestamp.
    pub event_time: String,
    /// The record itself.
    pub payload: serde_json::Value,
}

/// Writes records of one schema to a SQLite table named after the schema.
///
/// Layout: `{table}(id, event_date, event_time, payload_json)` with an index
/// on `(event_date, event_time)`. The `system_log_tables` catalog remembers
/// which schema version created each table; a version mismatch moves the old
/// table aside to `{table}_{n}` instead of mixing shapes.
pub struct SqliteSink<R> {
    pool: DbPool,
    _record: PhantomData<fn(&R)>,
}

impl<R: LogRecord> SqliteSink<R> {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }
}

impl<R: LogRecord> LogSink<R> for SqliteSink<R> {
    fn ensure_destination_exists(&self) -> Result<(), SinkError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let table = R::table_name();
        let recorded_version: Option<u32> = tx
            .query_row(
                "SELECT schema_version FROM system_log_tables WHERE table_name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;

        if table_exists(&tx, table)? {
            if recorded_version == Some(R::SCHEMA_VERSION) {
                return Ok(());
            }
            let renamed = free_table_name(&tx, table)?;
            // Index names survive a rename and would clash with the new table.
            tx.execute_batch(&format!(
                "DROP INDEX IF EXISTS idx_{table}_event_time;
                 ALTER TABLE {table} RENAME TO {renamed};"
            ))?;
            tracing::warn!(
                log = R::name(),
                table,
                renamed = %renamed,
                old_version = ?recorded_version,
                new_version = R::SCHEMA_VERSION,
                "system log table has a different schema version, moved it aside"
            );
        }

        tx.execute_batch(&format!(
            "CREATE TABLE {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_date TEXT NOT NULL,
                event_time TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );
            CREATE INDEX idx_{table}_event_time ON {table} (event_date, event_time);"
        ))?;
        tx.execute(
            "INSERT INTO system_log_tables (table_name, record_name, schema_version)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(table_name) DO UPDATE SET
                record_name = excluded.record_name,
                schema_version = excluded.schema_version,
                created_at = datetime('now')",
            params![table, R::name(), R::SCHEMA_VERSION],
        )?;
        tx.commit()?;

        tracing::info!(log = R::name(), table, "created system log table");
        Ok(())
    }

    fn persist_batch(&self, records: &[R]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (event_date, event_time, payload_json) VALUES (?1, ?2, ?3)",
                R::table_name()
            ))?;
            for record in records {
                let event_time: DateTime<Utc> = record.event_time();
                let payload_json = serde_json::to_string(record)?;
                stmt.execute(params![
                    event_time.format("%Y-%m-%d").to_string(),
                    event_time.to_rfc3339(),
                    payload_json,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<PersistedRow>, SinkError> {
        let conn = self.pool.get()?;
        let table = R::table_name();
        if !table_exists(&conn, table)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT id, event_time, payload_json FROM {table} ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut persisted = Vec::new();
        for row in rows {
            let (id, event_time, payload_json) = row?;
            persisted.push(PersistedRow {
                id,
                event_time,
                payload: serde_json::from_str(&payload_json)?,
            });
        }
        persisted.reverse();
        Ok(persisted)
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
}

/// First `{table}_{n}` that is not taken.
fn free_table_name(conn: &Connection, table: &str) -> Result<String, rusqlite::Error> {
    let mut suffix = 0u32;
    loop {
        let candidate = format!("{table}_{suffix}");
        if !table_exists(conn, &candidate)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Serialize;
    use sysevent_db::{create_pool, run_migrations, DbRuntimeSettings};

    #[derive(Debug, Serialize)]
    struct Probe {
        event_time: DateTime<Utc>,
        value: u32,
    }

    impl LogRecord for Probe {
        fn name() -> &'static str {
            "ProbeLog"
        }
        fn table_name() -> &'static str {
            "probe_log"
        }
        fn event_time(&self) -> DateTime<Utc> {
            self.event_time
        }
    }

    #[derive(Debug, Serialize)]
    struct ProbeV2 {
        event_time: DateTime<Utc>,
    }

    impl LogRecord for ProbeV2 {
        const SCHEMA_VERSION: u32 = 2;
        fn name() -> &'static str {
            "ProbeLog"
        }
        fn table_name() -> &'static str {
            "probe_log"
        }
        fn event_time(&self) -> DateTime<Utc> {
            self.event_time
        }
    }

    fn test_pool(dir: &tempfile::TempDir) -> DbPool {
        let path = dir.path().join("sink.db");
        let pool = create_pool(
            path.to_str().expect("utf-8 path"),
            DbRuntimeSettings::default(),
        )
        .expect("pool should open");
        let conn = pool.get().expect("should get connection");
        run_migrations(&conn).expect("migrations should succeed");
        pool
    }

    fn probe(value: u32) -> Probe {
        Probe {
            event_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn persists_batches_in_order() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let sink = SqliteSink::<Probe>::new(test_pool(&dir));

        sink.ensure_destination_exists().expect("prepare should succeed");
        sink.persist_batch(&[probe(1), probe(2), probe(3)])
            .expect("persist should succeed");

        let rows = sink.query_recent(10).expect("query should succeed");
        let values: Vec<u64> = rows
            .iter()
            .map(|row| row.payload["value"].as_u64().expect("numeric value"))
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert!(rows[0].event_time.starts_with("2024-03-01T12:00:00"));
    }

    #[test]
    fn prepare_is_idempotent() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let sink = SqliteSink::<Probe>::new(test_pool(&dir));

        sink.ensure_destination_exists().expect("first prepare");
        sink.persist_batch(&[probe(7)]).expect("persist should succeed");
        sink.ensure_destination_exists().expect("second prepare");

        assert_eq!(sink.query_recent(10).expect("query").len(), 1);
    }

    #[test]
    fn schema_change_moves_old_table_aside() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let pool = test_pool(&dir);

        let v1 = SqliteSink::<Probe>::new(pool.clone());
        v1.ensure_destination_exists().expect("v1 prepare");
        v1.persist_batch(&[probe(1)]).expect("v1 persist");

        let v2 = SqliteSink::<ProbeV2>::new(pool.clone());
        v2.ensure_destination_exists().expect("v2 prepare");
        assert!(v2.query_recent(10).expect("query").is_empty());

        let conn = pool.get().expect("connection");
        let archived: i64 = conn
            .query_row("SELECT COUNT(*) FROM probe_log_0", [], |row| row.get(0))
            .expect("archived table should exist");
        assert_eq!(archived, 1);

        let version: u32 = conn
            .query_row(
                "SELECT schema_version FROM system_log_tables WHERE table_name = 'probe_log'",
                [],
                |row| row.get(0),
            )
            .expect("catalog row");
        assert_eq!(version, 2);
    }

    #[test]
    fn query_before_prepare_returns_nothing() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let sink = SqliteSink::<Probe>::new(test_pool(&dir));
        assert!(sink.query_recent(5).expect("query").is_empty());
    }
}
