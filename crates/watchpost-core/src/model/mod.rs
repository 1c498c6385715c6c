//! Entity model: hosts, reporters, metrics, issues, log lines

pub mod host;
pub mod issue;
pub mod log_line;
pub mod metric;
pub mod reporter;

pub use host::{ChildHost, Host, MAX_ANCESTRY_DEPTH, ancestors};
pub use issue::Issue;
pub use log_line::LogLine;
pub use metric::{Metric, MetricStatus, MetricType, MetricValue, Thresholds};
pub use reporter::{LogLineStream, Reporter, ReporterFactory};
