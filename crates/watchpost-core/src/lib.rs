//! watchpost-core: Agent runtime
//!
//! Entity model, reporter registry, credential lifecycle, wire mapping, and
//! the session orchestrator that owns the authenticated collector connection.

pub mod agent;
pub mod config;
pub mod credentials;
pub mod error;
pub mod model;
pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;
pub mod wire;

pub use agent::Agent;
pub use config::{CredentialPaths, CredentialPolicy, SessionSettings};
pub use credentials::{
    CertificateManager, ChannelConfig, Credential, CredentialState, PROVISIONING_SUBJECT,
    TrustPool,
};
pub use error::{AgentError, HostError, PluginError, ReporterError};
pub use model::{
    ChildHost, Host, Issue, LogLine, LogLineStream, MAX_ANCESTRY_DEPTH, Metric, MetricStatus,
    MetricType, MetricValue, Reporter, ReporterFactory, Thresholds, ancestors,
};
pub use queue::{LogQueueCloser, LogQueueReceiver, LogQueueSender, QueueClosed, log_queue};
pub use registry::ReporterRegistry;
pub use session::{RunOutcome, Session, SessionState};
pub use transport::{CollectorConnection, Connector, LogStreamSink};
pub use wire::{UNMAPPED_ISSUE_ID, report_request};
