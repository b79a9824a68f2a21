//! Storage-layer records: data parts, transactions, and filesystem cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a data part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartEventKind {
    NewPart,
    MergeParts,
    DownloadPart,
    RemovePart,
    MutatePart,
    MovePart,
}

impl PartEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewPart => "NewPart",
            Self::MergeParts => "MergeParts",
            Self::DownloadPart => "DownloadPart",
            Self::RemovePart => "RemovePart",
            Self::MutatePart => "MutatePart",
            Self::MovePart => "MovePart",
        }
    }
}

/// One data part lifecycle event (`part_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartLog {
    pub event_kind: PartEventKind,
    pub event_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub database: String,
    pub table: String,
    pub part_name: String,
    pub partition_id: String,
    pub rows: u64,
    pub size_in_bytes: u64,
    /// Source parts for merges and mutations.
    pub merged_from: Vec<String>,
    pub error: u16,
    pub exception: Option<String>,
}

crate::log_record!(PartLog, "PartLog", "part_log");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionEventKind {
    Begin,
    Commit,
    Rollback,
    AddPart,
    LockPart,
    UnlockPart,
}

/// Transaction state change (`transactions_info_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsInfoLog {
    pub event_kind: TransactionEventKind,
    pub event_time: DateTime<Utc>,
    pub thread_id: u64,
    pub query_id: String,
    pub transaction_id: uuid::Uuid,
    /// Commit sequence number; zero until committed.
    pub csn: u64,
    pub database: String,
    pub table: String,
    pub part: String,
}

crate::log_record!(
    TransactionsInfoLog,
    "TransactionsInfoLog",
    "transactions_info_log"
);

/// How a read was served by the filesystem cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheReadKind {
    ReadFromCache,
    ReadFromFsAndDownloadedToCache,
    ReadFromFsBypassingCache,
}

/// One cached file segment read (`filesystem_cache_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemCacheLog {
    pub event_time: DateTime<Utc>,
    pub query_id: String,
    pub source_file_path: String,
    /// Inclusive byte range of the segment.
    pub file_segment_range: (u64, u64),
    pub total_requested_range: (u64, u64),
    pub size: u64,
    pub read_kind: CacheReadKind,
    pub read_from_cache_attempted: bool,
    pub read_buffer_id: String,
}

crate::log_record!(
    FilesystemCacheLog,
    "FilesystemCacheLog",
    "filesystem_cache_log"
);

/// Final fate of a read prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefetchState {
    Used,
    CancelledWithSeek,
    CancelledWithRangeChange,
    Unneeded,
}

/// One remote read prefetch (`filesystem_read_prefetches_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemReadPrefetchesLog {
    pub event_time: DateTime<Utc>,
    pub query_id: String,
    pub path: String,
    pub offset: u64,
    pub size: i64,
    pub prefetch_submit_time: DateTime<Utc>,
    pub priority: u64,
    pub prefetch_execution_start_time: Option<DateTime<Utc>>,
    pub prefetch_execution_end_time: Option<DateTime<Utc>>,
    pub prefetch_execution_time_us: u64,
    pub state: PrefetchState,
    pub thread_id: u64,
    pub reader_id: String,
}

crate::log_record!(
    FilesystemReadPrefetchesLog,
    "FilesystemReadPrefetchesLog",
    "filesystem_read_prefetches_log"
);
