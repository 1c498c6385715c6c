//! Syslog socket reporter
//!
//! Takes over the syslog datagram socket that systemd-journald would
//! otherwise own and forwards every message as a log line. Messages are
//! RFC 3164 framed: `<PRI>Mmm dd hh:mm:ss [HOST ]TAG[PID]: CONTENT`.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, TimeZone, Utc};
use futures::StreamExt;
use futures::stream;
use tokio::net::UnixDatagram;
use tracing::{debug, info, warn};
use watchpost_core::{
    Host, Issue, LogLine, LogLineStream, Metric, PluginError, Reporter, ReporterError,
    ReporterFactory,
};

/// Reporter and factory id
pub const SYSLOG_ID: &str = "syslogsocket";

const JOURNAL_DIR: &str = "/run/systemd/journal";
const SOCKET_PATH: &str = "/run/systemd/journal/syslog";

/// Largest datagram read in one go; longer messages are truncated
const DATAGRAM_SIZE: usize = 4096;

/// Tag on lines forwarded without parsing
pub const UNPARSED_TAG: &str = "unparsed";

/// Creates a `SyslogReporter` on hosts running systemd-journald
#[derive(Debug, Clone)]
pub struct SyslogFactory {
    journal_dir: PathBuf,
    socket_path: PathBuf,
}

impl SyslogFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_paths(JOURNAL_DIR, SOCKET_PATH)
    }

    /// Gate on `journal_dir` and bind `socket_path`
    #[must_use]
    pub fn with_paths(journal_dir: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: journal_dir.into(),
            socket_path: socket_path.into(),
        }
    }
}

impl Default for SyslogFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReporterFactory for SyslogFactory {
    fn id(&self) -> &str {
        SYSLOG_ID
    }

    async fn applicable_to(&self, host: &Arc<dyn Host>) -> Result<bool, PluginError> {
        if !host.is_local() {
            return Ok(false);
        }
        Ok(tokio::fs::try_exists(&self.journal_dir)
            .await
            .unwrap_or(false))
    }

    async fn create(&self, host: &Arc<dyn Host>) -> Result<Arc<dyn Reporter>, PluginError> {
        let host_name = host
            .human_name()
            .map_err(|e| PluginError::Construction(e.to_string()))?;

        match tokio::fs::remove_file(&self.socket_path).await {
            Ok(()) => debug!(path = %self.socket_path.display(), "removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PluginError::Construction(format!(
                    "remove {}: {e}",
                    self.socket_path.display()
                )));
            }
        }

        let socket = UnixDatagram::bind(&self.socket_path).map_err(|e| {
            PluginError::Construction(format!("bind {}: {e}", self.socket_path.display()))
        })?;
        info!(path = %self.socket_path.display(), "listening for syslog datagrams");

        Ok(Arc::new(SyslogReporter {
            origin: Origin {
                host_id: host.id().to_string(),
                host_name,
            },
            socket: Mutex::new(Some(socket)),
        }))
    }
}

/// Forwards syslog datagrams as log lines
///
/// Reports no issues, metrics or sub-hosts.
pub struct SyslogReporter {
    origin: Origin,
    socket: Mutex<Option<UnixDatagram>>,
}

/// Host stamped on every forwarded line
#[derive(Debug, Clone)]
struct Origin {
    host_id: String,
    host_name: String,
}

impl Origin {
    fn line(&self, datagram: &[u8], received: DateTime<Utc>) -> LogLine {
        let text = String::from_utf8_lossy(datagram);
        let text = text.trim_end_matches(['\n', '\0']);

        let (line, tags, timestamp) = match parse_rfc3164(text, received) {
            Some(message) => (message.content.clone(), message.tags(), message.timestamp),
            None => (text.to_string(), vec![UNPARSED_TAG.to_string()], received),
        };

        LogLine {
            host_id: self.host_id.clone(),
            host_name: self.host_name.clone(),
            reporter_id: SYSLOG_ID.to_string(),
            line,
            tags,
            timestamp,
        }
    }
}

#[async_trait]
impl Reporter for SyslogReporter {
    fn id(&self) -> &str {
        SYSLOG_ID
    }

    async fn issues(&self) -> Result<Vec<Issue>, ReporterError> {
        Ok(Vec::new())
    }

    async fn metrics(&self) -> Result<Vec<Metric>, ReporterError> {
        Ok(Vec::new())
    }

    async fn hosts(&self) -> Result<Vec<Arc<dyn Host>>, ReporterError> {
        Ok(Vec::new())
    }

    fn take_log_lines(&self) -> Option<LogLineStream> {
        let socket = self.socket.lock().ok()?.take()?;

        let lines = stream::unfold(
            (socket, self.origin.clone(), vec![0u8; DATAGRAM_SIZE]),
            |(socket, origin, mut buf)| async move {
                match socket.recv(&mut buf).await {
                    Ok(n) => {
                        let line = origin.line(&buf[..n], Utc::now());
                        Some((line, (socket, origin, buf)))
                    }
                    Err(e) => {
                        warn!(error = %e, "syslog socket failed, log stream ends");
                        None
                    }
                }
            },
        );
        Some(lines.boxed())
    }
}

/// A parsed RFC 3164 message
#[derive(Debug, Clone, PartialEq, Eq)]
struct SyslogMessage {
    priority: u8,
    timestamp: DateTime<Utc>,
    tag: String,
    content: String,
}

impl SyslogMessage {
    fn facility(&self) -> u8 {
        self.priority / 8
    }

    fn severity(&self) -> u8 {
        self.priority % 8
    }

    fn tags(&self) -> Vec<String> {
        let mut tags = vec![
            format!("priority-{}", self.priority),
            format!("facility-{}", self.facility()),
            format!("severity-{}", self.severity()),
        ];
        if !self.tag.is_empty() {
            tags.push(format!("tag-{}", self.tag));
        }
        tags
    }
}

/// Parse one datagram; `received` fixes the year of the timestamp
fn parse_rfc3164(text: &str, received: DateTime<Utc>) -> Option<SyslogMessage> {
    let rest = text.strip_prefix('<')?;
    let end = rest.find('>')?;
    let priority: u8 = rest[..end].parse().ok()?;
    if priority > 191 {
        return None;
    }
    let rest = &rest[end + 1..];

    // "Mmm dd hh:mm:ss", day space-padded
    let stamp = rest.get(..15)?;
    let timestamp = parse_timestamp(stamp, received)?;
    let rest = rest[15..].strip_prefix(' ').unwrap_or(&rest[15..]);

    let (tag, content) = match split_tag(rest) {
        Some(parts) => parts,
        // first word may be the sending host
        None => match rest.split_once(' ').and_then(|(_, after)| split_tag(after)) {
            Some(parts) => parts,
            None => ("", rest),
        },
    };

    Some(SyslogMessage {
        priority,
        timestamp,
        tag: tag.to_string(),
        content: content.to_string(),
    })
}

/// `TAG[PID]: CONTENT` or `TAG: CONTENT`
fn split_tag(text: &str) -> Option<(&str, &str)> {
    let end = text.find(['[', ':', ' '])?;
    let tag = &text[..end];
    if tag.is_empty() {
        return None;
    }

    let after = match text.as_bytes()[end] {
        b'[' => {
            let close = text[end..].find("]:")?;
            &text[end + close + 2..]
        }
        b':' => &text[end + 1..],
        _ => return None,
    };
    Some((tag, after.strip_prefix(' ').unwrap_or(after)))
}

fn parse_timestamp(stamp: &str, received: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let local_received = received.with_timezone(&Local);
    let at_year = |year: i32| {
        let naive =
            NaiveDateTime::parse_from_str(&format!("{year} {stamp}"), "%Y %b %e %H:%M:%S").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    };

    let stamped = at_year(local_received.year())?;
    // a December message read in January
    if stamped > received + Duration::days(1) {
        return at_year(local_received.year() - 1);
    }
    Some(stamped)
}
