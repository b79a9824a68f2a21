//! Client session and coordination-service records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Authentication event recorded in `session_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionEventKind {
    LoginFailure,
    LoginSuccess,
    Logout,
}

impl SessionEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginFailure => "LoginFailure",
            Self::LoginSuccess => "LoginSuccess",
            Self::Logout => "Logout",
        }
    }
}

/// One login or logout (`session_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub kind: SessionEventKind,
    pub auth_id: uuid::Uuid,
    pub session_id: String,
    pub event_time: DateTime<Utc>,
    pub user: String,
    pub auth_type: String,
    pub interface: String,
    pub client_address: IpAddr,
    pub client_port: u16,
    pub client_name: String,
    pub failure_reason: Option<String>,
}

crate::log_record!(SessionLog, "SessionLog", "session_log");

/// Phase of a coordination-service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZooKeeperEventKind {
    Request,
    Response,
    /// The session ended before a response arrived.
    Finalize,
}

/// One coordination-service request or response (`zookeeper_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZooKeeperLog {
    pub kind: ZooKeeperEventKind,
    pub event_time: DateTime<Utc>,
    pub thread_id: u64,
    pub query_id: String,
    pub address: String,
    pub session_id: i64,
    pub xid: i32,
    pub has_watch: bool,
    pub op_num: i32,
    pub path: String,
    pub data: Option<String>,
    /// Response code; `None` for requests.
    pub error: Option<i32>,
    pub zxid: i64,
    pub duration_ms: u64,
}

crate::log_record!(ZooKeeperLog, "ZooKeeperLog", "zookeeper_log");
