//! Database layer for the system logs.
//!
//! Provides the SQLite connection pool (via `r2d2`) that every log sink
//! writes through, WAL-mode initialisation, and the embedded migrations for
//! the bookkeeping tables (`system_log_tables`, `flush_history`). The
//! per-record destination tables themselves are created lazily by the sinks,
//! since their lifetime follows the record schema version rather than the
//! migration list.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
