//! Reporter and reporter factory contracts

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{PluginError, ReporterError};
use crate::model::host::Host;
use crate::model::issue::Issue;
use crate::model::log_line::LogLine;
use crate::model::metric::Metric;

/// Infinite stream of log lines from one reporter
///
/// Ends only when the reporter's own I/O fails.
pub type LogLineStream = BoxStream<'static, LogLine>;

/// An active data source bound to a host
///
/// Created once by the registry, lives for the process lifetime.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Reporter identifier
    fn id(&self) -> &str;

    /// Current issues affecting the host
    async fn issues(&self) -> Result<Vec<Issue>, ReporterError>;

    /// Current metrics for the host
    async fn metrics(&self) -> Result<Vec<Metric>, ReporterError>;

    /// Sub-hosts discovered under the host
    async fn hosts(&self) -> Result<Vec<Arc<dyn Host>>, ReporterError>;

    /// Take the reporter's log line stream
    ///
    /// Returns `Some` at most once per process; the stream cannot be
    /// restarted after it is taken. Reporters without logs keep the default.
    fn take_log_lines(&self) -> Option<LogLineStream> {
        None
    }
}

/// Conditionally produces a reporter for a host
#[async_trait]
pub trait ReporterFactory: Send + Sync {
    /// Factory identifier
    fn id(&self) -> &str;

    /// Whether this factory has anything to report about `host`
    ///
    /// # Errors
    /// Returns `PluginError::Applicability` if the check itself fails.
    async fn applicable_to(&self, host: &Arc<dyn Host>) -> Result<bool, PluginError>;

    /// Build the reporter
    ///
    /// # Errors
    /// Returns `PluginError::Construction` on failure.
    async fn create(&self, host: &Arc<dyn Host>) -> Result<Arc<dyn Reporter>, PluginError>;
}
