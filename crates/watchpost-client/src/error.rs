//! Error types for the collector client

use thiserror::Error;
use watchpost_core::AgentError;

/// Errors that can occur talking to the collector
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Client identity or trust pool rejected by the TLS stack
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Collector returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the collector
        message: String,
    },

    /// Connection or stream closed
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for AgentError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Json(_) | ClientError::Api { .. } => AgentError::Protocol(err.to_string()),
            ClientError::Tls(_) => AgentError::Credential(err.to_string()),
            ClientError::Http(ref e) if e.is_decode() => AgentError::Protocol(err.to_string()),
            ClientError::Http(_) | ClientError::Url(_) | ClientError::ConnectionClosed(_) => {
                AgentError::Transport(err.to_string())
            }
        }
    }
}
