//! watchpost-client: HTTPS transport to the collector
//!
//! Implements the core's `Connector` and `CollectorConnection` contracts over
//! mutually authenticated HTTPS. Each collector call is a JSON `POST`; the
//! log stream is a single long-lived `POST` with a newline-delimited JSON
//! body.
//!
//! ```no_run
//! use watchpost_client::HttpConnector;
//! use watchpost_core::Connector;
//!
//! # async fn example(config: watchpost_core::ChannelConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let connector = HttpConnector::new("https://collector.example:8443")?;
//! let connection = connector.connect(&config).await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod logs;

pub use error::{ClientError, Result};
pub use http::{HttpCollector, HttpConnector};
pub use logs::HttpLogSink;
