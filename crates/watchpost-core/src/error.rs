//! Core error types for watchpost-core

use thiserror::Error;

/// Errors raised by a reporter factory
///
/// Always isolated to the factory that raised them; the registry logs and
/// skips.
#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// Applicability predicate failed
    #[error("applicability check failed: {0}")]
    Applicability(String),

    /// Reporter construction failed
    #[error("reporter construction failed: {0}")]
    Construction(String),
}

/// Errors raised by a host
#[derive(Error, Debug, Clone)]
pub enum HostError {
    /// Human-readable name could not be resolved
    #[error("human name unavailable for host {host}: {reason}")]
    NameUnavailable {
        /// Host identifier
        host: String,
        /// Underlying failure
        reason: String,
    },
}

/// Errors raised by a reporter while building a snapshot
#[derive(Error, Debug, Clone)]
pub enum ReporterError {
    /// Data source query failed
    #[error("collection failed: {0}")]
    Collection(String),

    /// I/O failure talking to the data source
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors that end an agent run
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    /// Connection-level failure talking to the collector
    #[error("transport error: {0}")]
    Transport(String),

    /// Collector rejected or garbled a request
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credential missing, unparsable, or unusable
    #[error("credential error: {0}")]
    Credential(String),

    /// Reading or writing credential files failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Host lookup failed
    #[error(transparent)]
    Host(#[from] HostError),

    /// Reporter snapshot failed
    #[error(transparent)]
    Reporter(#[from] ReporterError),

    /// Session asked to run from a state other than idle or running
    #[error("session cannot run while {0}")]
    NotRunnable(String),
}

impl AgentError {
    /// Connection-level failure
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, AgentError::Transport(_))
    }

    /// Collector rejected the request
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, AgentError::Protocol(_))
    }
}
