//! HTTPS collector connection

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Identity};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use watchpost_api::{
    ConfigureAck, HostWire, ReportRequest, ReportResponse, SigningRequest, SigningResponse,
};
use watchpost_core::{AgentError, ChannelConfig, CollectorConnection, Connector, LogStreamSink};

use crate::error::{ClientError, Result};
use crate::logs::HttpLogSink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Opens `HttpCollector`s against one collector URL
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_url: Url,
}

impl HttpConnector {
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            base_url: base(base_url.as_ref())?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        config: &ChannelConfig,
    ) -> std::result::Result<Arc<dyn CollectorConnection>, AgentError> {
        let collector = HttpCollector::new(self.base_url.clone(), config)?;
        info!(
            collector = %self.base_url,
            subject = %config.credential().subject(),
            "connected to collector"
        );
        Ok(Arc::new(collector))
    }
}

/// One mutually authenticated HTTPS client bound to a credential
#[derive(Debug)]
pub struct HttpCollector {
    client: Client,
    streaming: Client,
    base_url: Url,
    closed: AtomicBool,
}

impl HttpCollector {
    /// Build a client presenting `config`'s credential and trusting only its pool
    ///
    /// # Errors
    /// Returns `ClientError::Tls` if the credential or trust pool is rejected.
    pub fn new(base_url: Url, config: &ChannelConfig) -> Result<Self> {
        let identity = Identity::from_pem(config.credential().identity_pem().as_bytes())
            .map_err(|e| ClientError::Tls(format!("client identity: {e}")))?;
        let roots = Certificate::from_pem_bundle(config.trust_pool().pem().as_bytes())
            .map_err(|e| ClientError::Tls(format!("trust pool: {e}")))?;

        let builder = || {
            let mut builder = Client::builder()
                .tls_certs_only([])
                .identity(identity.clone())
                .connect_timeout(CONNECT_TIMEOUT);
            for root in &roots {
                builder = builder.add_root_certificate(root.clone());
            }
            builder
        };

        let client = builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Tls(e.to_string()))?;
        // the log stream stays open for the whole run
        let streaming = builder()
            .build()
            .map_err(|e| ClientError::Tls(e.to_string()))?;

        Ok(Self {
            client,
            streaming,
            base_url,
            closed: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(ClientError::Url)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::ConnectionClosed(
                "connection already closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Perform a POST request with JSON body
    async fn post<T: DeserializeOwned>(&self, path: &str, body: impl serde::Serialize) -> Result<T> {
        self.ensure_open()?;
        let url = self.url(path)?;
        let response = self.client.post(url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CollectorConnection for HttpCollector {
    async fn configure_me(&self, host: HostWire) -> std::result::Result<ConfigureAck, AgentError> {
        Ok(self.post("v1/configure", host).await?)
    }

    async fn report(
        &self,
        request: ReportRequest,
    ) -> std::result::Result<ReportResponse, AgentError> {
        Ok(self.post("v1/report", request).await?)
    }

    async fn sign_me(
        &self,
        request: SigningRequest,
    ) -> std::result::Result<SigningResponse, AgentError> {
        Ok(self.post("v1/sign", request).await?)
    }

    async fn record_logs(&self) -> std::result::Result<Box<dyn LogStreamSink>, AgentError> {
        self.ensure_open()?;
        let url = self.url("v1/logs")?;
        Ok(Box::new(HttpLogSink::open(self.streaming.clone(), url)))
    }

    async fn close(&self) -> std::result::Result<(), AgentError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(collector = %self.base_url, "connection closed");
        }
        Ok(())
    }
}

/// Parse a base URL so relative endpoint paths append to it
fn base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
