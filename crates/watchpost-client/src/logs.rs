//! Streaming `RecordLogs` upload
//!
//! The request body is fed from a channel, one JSON object per line, so a
//! single `POST` carries every line of the run.

use std::io;

use async_trait::async_trait;
use futures::SinkExt;
use futures::channel::mpsc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Client};
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use watchpost_api::{LogLineWire, LogStreamAck};
use watchpost_core::{AgentError, LogStreamSink};

use crate::error::{ClientError, Result};

/// Frames buffered between the relay and the request body
const BODY_BUFFER: usize = 16;

type Frame = std::result::Result<Vec<u8>, io::Error>;

/// Outbound half of a log stream upload
pub struct HttpLogSink {
    frames: mpsc::Sender<Frame>,
    request: Option<JoinHandle<Result<LogStreamAck>>>,
}

impl HttpLogSink {
    /// Start the upload; lines flow once `send` is called
    #[must_use]
    pub fn open(client: Client, url: Url) -> Self {
        let (frames, body) = mpsc::channel::<Frame>(BODY_BUFFER);

        let request = tokio::spawn(async move {
            let response = client
                .post(url)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(Body::wrap_stream(body))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(ClientError::Api { status, message });
            }

            let ack: LogStreamAck = response.json().await?;
            debug!(received = ack.received, "log stream acknowledged");
            Ok(ack)
        });

        Self {
            frames,
            request: Some(request),
        }
    }

    /// Why the upload stopped accepting frames
    async fn failure(&mut self) -> ClientError {
        let Some(request) = self.request.take() else {
            return ClientError::ConnectionClosed("log stream closed".to_string());
        };

        match request.await {
            Ok(Ok(ack)) => ClientError::ConnectionClosed(format!(
                "collector ended log stream after {} lines",
                ack.received
            )),
            Ok(Err(e)) => e,
            Err(e) => ClientError::ConnectionClosed(format!("log upload task failed: {e}")),
        }
    }
}

#[async_trait]
impl LogStreamSink for HttpLogSink {
    async fn send(&mut self, line: LogLineWire) -> std::result::Result<(), AgentError> {
        let frame = encode(&line)?;
        if self.frames.send(Ok(frame)).await.is_err() {
            return Err(self.failure().await.into());
        }
        Ok(())
    }
}

/// One newline-terminated JSON object
fn encode(line: &LogLineWire) -> Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(line)?;
    frame.push(b'\n');
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use watchpost_api::TimestampWire;

    use super::*;

    #[test]
    fn test_frame_is_one_json_line() {
        let line = LogLineWire {
            reporter: "syslogsocket".to_string(),
            timestamp: TimestampWire {
                seconds: 1_700_000_000,
                nanos: 0,
            },
            line: "multi\nline".to_string(),
            host: "box".to_string(),
            tags: vec!["severity-6".to_string()],
        };

        let frame = encode(&line).unwrap();

        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);
        let decoded: LogLineWire = serde_json::from_slice(&frame).unwrap();
        assert_eq!(decoded, line);
    }
}
