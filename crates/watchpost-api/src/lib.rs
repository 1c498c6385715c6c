//! watchpost-api: Wire shapes exchanged with the collector
//!
//! Request, response, and streaming message types for the four collector
//! calls (`ConfigureMe`, `Report`, `SignMe`, `RecordLogs`). These are plain
//! serde types; translation from the entity model lives in `watchpost-core`.

pub mod logs;
pub mod requests;
pub mod responses;
pub mod snapshot;

pub use logs::{LogLineWire, TimestampWire};
pub use requests::{ReportRequest, SigningRequest};
pub use responses::{ConfigureAck, LogStreamAck, ReportResponse, SigningResponse};
pub use snapshot::{HostWire, IssueWire, MetricStatusWire, MetricValueWire, MetricWire, ReporterWire};
