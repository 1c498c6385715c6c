//! Log lines produced by reporters

use chrono::{DateTime, Utc};

/// One line from a reporter's log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Id of the host the line came from
    pub host_id: String,
    /// Human name of that host, resolved by the producing reporter
    pub host_name: String,
    /// Id of the producing reporter
    pub reporter_id: String,
    /// Line text
    pub line: String,
    /// Free-form tags (`severity-3`, `tag-sshd`, ...)
    pub tags: Vec<String>,
    /// When the line was logged
    pub timestamp: DateTime<Utc>,
}
