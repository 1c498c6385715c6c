//! Error types for watchpost-reporters

use std::time::Duration;

use thiserror::Error;
use watchpost_core::{PluginError, ReporterError};

/// Errors that can occur running a local command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },
}

/// Errors that can occur querying the package manager
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// Package manager not found on system
    #[error("package manager not found: {0}")]
    ManagerNotFound(String),

    /// Command execution failed
    #[error("command failed: {status} - {message}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Failed to parse command output
    #[error("parse error: {0}")]
    ParseError(String),

    /// Execution error from the command runner
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl From<ExecError> for PackageError {
    fn from(err: ExecError) -> Self {
        PackageError::ExecutionError(err.to_string())
    }
}

impl From<PackageError> for ReporterError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::ExecutionError(msg) => ReporterError::Io(msg),
            other => ReporterError::Collection(other.to_string()),
        }
    }
}

impl From<PackageError> for PluginError {
    fn from(err: PackageError) -> Self {
        PluginError::Construction(err.to_string())
    }
}
