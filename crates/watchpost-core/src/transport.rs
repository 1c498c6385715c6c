//! Collector connection contract
//!
//! The core never speaks a wire protocol itself. A `Connector` turns a
//! channel configuration into a live, authenticated `CollectorConnection`;
//! `watchpost-client` supplies the HTTPS implementation and tests supply
//! mocks.

use std::sync::Arc;

use async_trait::async_trait;
use watchpost_api::{
    ConfigureAck, HostWire, LogLineWire, ReportRequest, ReportResponse, SigningRequest,
    SigningResponse,
};

use crate::credentials::ChannelConfig;
use crate::error::AgentError;

/// One authenticated connection to the collector
///
/// Never mutated after construction. Rotation closes it and connects a new
/// one.
#[async_trait]
pub trait CollectorConnection: Send + Sync {
    /// `ConfigureMe`, sent once per connection
    async fn configure_me(&self, host: HostWire) -> Result<ConfigureAck, AgentError>;

    /// `Report`, sent once per tick
    async fn report(&self, request: ReportRequest) -> Result<ReportResponse, AgentError>;

    /// `SignMe`, sent only during credential issuance
    async fn sign_me(&self, request: SigningRequest) -> Result<SigningResponse, AgentError>;

    /// Open the long-lived `RecordLogs` stream
    async fn record_logs(&self) -> Result<Box<dyn LogStreamSink>, AgentError>;

    /// Release the connection
    async fn close(&self) -> Result<(), AgentError>;
}

/// Outbound half of a `RecordLogs` stream
#[async_trait]
pub trait LogStreamSink: Send {
    /// Write one line
    ///
    /// # Errors
    /// Any error ends the stream; callers do not retry.
    async fn send(&mut self, line: LogLineWire) -> Result<(), AgentError>;
}

/// Opens connections from a channel configuration
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        config: &ChannelConfig,
    ) -> Result<Arc<dyn CollectorConnection>, AgentError>;
}
