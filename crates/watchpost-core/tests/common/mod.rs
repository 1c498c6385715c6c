#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use futures::StreamExt;
use futures::channel::mpsc;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, DnValue, IsCa, KeyPair,
};
use tokio::time::Instant;

use watchpost_api::{
    ConfigureAck, HostWire, LogLineWire, ReportRequest, ReportResponse, SigningRequest,
    SigningResponse,
};
use watchpost_core::*;

// Certificates

fn validity(params: &mut CertificateParams, not_after: DateTime<Utc>) {
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    let day = not_after.date_naive();
    params.not_after = rcgen::date_time_ymd(day.year(), day.month() as u8, day.day() as u8);
}

fn named(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    dn
}

/// Self-signed leaf, expiring at midnight UTC on `not_after`'s date
pub fn cert_pair(common_name: &str, not_after: DateTime<Utc>) -> (String, String) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["box.example".to_string()]).unwrap();
    params.distinguished_name = named(common_name);
    validity(&mut params, not_after);

    let cert = params.self_signed(&key).unwrap();
    (cert.pem(), key.serialize_pem())
}

/// Stand-in for the collector's signing authority
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
    issued_not_after: DateTime<Utc>,
}

impl TestCa {
    pub fn new(issued_not_after: DateTime<Utc>) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name = named("Watchpost Test CA");
        validity(&mut params, issued_not_after + chrono::Duration::days(365));

        let cert = params.self_signed(&key).unwrap();
        Self {
            cert,
            key,
            issued_not_after,
        }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn sign(&self, csr_pem: &str) -> String {
        let mut csr = CertificateSigningRequestParams::from_pem(csr_pem).unwrap();
        validity(&mut csr.params, self.issued_not_after);
        csr.signed_by(&self.cert, &self.key).unwrap().pem()
    }
}

/// Credential files laid out in a scratch directory
pub struct CredentialDir {
    pub dir: tempfile::TempDir,
    pub paths: CredentialPaths,
}

impl CredentialDir {
    pub fn new(ca: &TestCa) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = CredentialPaths {
            ca: dir.path().join("ca.pem"),
            cert: dir.path().join("client.pem"),
            key: dir.path().join("client-key.pem"),
            bootstrap_cert: dir.path().join("provisioning.pem"),
            bootstrap_key: dir.path().join("provisioning-key.pem"),
        };
        std::fs::write(&paths.ca, ca.pem()).unwrap();
        Self { dir, paths }
    }

    pub fn with_bootstrap(self, not_after: DateTime<Utc>) -> Self {
        let (cert, key) = cert_pair(PROVISIONING_SUBJECT, not_after);
        write(&self.paths.bootstrap_cert, &cert);
        write(&self.paths.bootstrap_key, &key);
        self
    }

    pub fn with_local(self, common_name: &str, not_after: DateTime<Utc>) -> Self {
        let (cert, key) = cert_pair(common_name, not_after);
        write(&self.paths.cert, &cert);
        write(&self.paths.key, &key);
        self
    }

    pub async fn manager(&self) -> CertificateManager {
        CertificateManager::open(self.paths.clone(), CredentialPolicy::default())
            .await
            .unwrap()
    }
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

// Collector

/// Records everything sent to it
#[derive(Default)]
pub struct MockConnection {
    pub subject: String,
    pub configured: Mutex<Vec<HostWire>>,
    pub reports: Mutex<Vec<(Instant, ReportRequest)>>,
    pub signing_requests: Mutex<Vec<String>>,
    pub logs: Arc<Mutex<Vec<LogLineWire>>>,
    pub closed: AtomicUsize,
    /// Scripted `Report` replies, `Ok(success: true)` once exhausted
    pub replies: Mutex<VecDeque<Result<bool, AgentError>>>,
    pub ca: Option<Arc<TestCa>>,
    pub signed_cert_override: Option<String>,
    /// Scripted `ConfigureMe` failure
    pub configure_error: Option<AgentError>,
    /// Log sinks fail every line after this many
    pub log_capacity: Option<usize>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Result<bool, AgentError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn refusing_configure(error: AgentError) -> Self {
        Self {
            configure_error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            log_capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn report_times(&self) -> Vec<Instant> {
        self.reports.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn forwarded(&self) -> Vec<LogLineWire> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl CollectorConnection for MockConnection {
    async fn configure_me(&self, host: HostWire) -> Result<ConfigureAck, AgentError> {
        self.configured.lock().unwrap().push(host);
        match &self.configure_error {
            Some(e) => Err(e.clone()),
            None => Ok(ConfigureAck::default()),
        }
    }

    async fn report(&self, request: ReportRequest) -> Result<ReportResponse, AgentError> {
        self.reports.lock().unwrap().push((Instant::now(), request));
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Ok(true));
        reply.map(|success| ReportResponse { success })
    }

    async fn sign_me(&self, request: SigningRequest) -> Result<SigningResponse, AgentError> {
        self.signing_requests.lock().unwrap().push(request.csr.clone());
        if let Some(cert) = &self.signed_cert_override {
            return Ok(SigningResponse { cert: cert.clone() });
        }
        match &self.ca {
            Some(ca) => Ok(SigningResponse {
                cert: ca.sign(&request.csr),
            }),
            None => Err(AgentError::Protocol("signing not available".into())),
        }
    }

    async fn record_logs(&self) -> Result<Box<dyn LogStreamSink>, AgentError> {
        Ok(Box::new(MockSink {
            lines: self.logs.clone(),
            remaining: self.log_capacity,
        }))
    }

    async fn close(&self) -> Result<(), AgentError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockSink {
    lines: Arc<Mutex<Vec<LogLineWire>>>,
    remaining: Option<usize>,
}

#[async_trait]
impl LogStreamSink for MockSink {
    async fn send(&mut self, line: LogLineWire) -> Result<(), AgentError> {
        match &mut self.remaining {
            Some(0) => return Err(AgentError::Transport("log stream reset".into())),
            Some(n) => *n -= 1,
            None => {}
        }
        self.lines.lock().unwrap().push(line);
        Ok(())
    }
}

/// Hands out a fresh `MockConnection` per `connect`
pub struct MockConnector {
    ca: Option<Arc<TestCa>>,
    signed_cert_override: Option<String>,
    configure_error: Option<AgentError>,
    pub connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnector {
    pub fn new(ca: Option<Arc<TestCa>>) -> Self {
        Self {
            ca,
            signed_cert_override: None,
            configure_error: None,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing_configure(ca: Option<Arc<TestCa>>, error: AgentError) -> Self {
        Self {
            configure_error: Some(error),
            ..Self::new(ca)
        }
    }

    pub fn signing_garbage(ca: Arc<TestCa>, cert: impl Into<String>) -> Self {
        Self {
            signed_cert_override: Some(cert.into()),
            ..Self::new(Some(ca))
        }
    }

    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        config: &ChannelConfig,
    ) -> Result<Arc<dyn CollectorConnection>, AgentError> {
        let connection = Arc::new(MockConnection {
            subject: config.credential().subject().to_string(),
            ca: self.ca.clone(),
            signed_cert_override: self.signed_cert_override.clone(),
            configure_error: self.configure_error.clone(),
            ..MockConnection::default()
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

// Hosts and reporters

pub struct TestHost {
    id: String,
    name: String,
    reporters: OnceLock<Vec<Arc<dyn Reporter>>>,
}

impl TestHost {
    pub fn new(id: &str, name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            name: name.to_string(),
            reporters: OnceLock::new(),
        })
    }

    pub fn attach(&self, reporters: Vec<Arc<dyn Reporter>>) {
        let _ = self.reporters.set(reporters);
    }
}

impl Host for TestHost {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_local(&self) -> bool {
        true
    }

    fn human_name(&self) -> Result<String, HostError> {
        Ok(self.name.clone())
    }

    fn parent(&self) -> Option<Arc<dyn Host>> {
        None
    }

    fn reporters(&self) -> Vec<Arc<dyn Reporter>> {
        self.reporters.get().cloned().unwrap_or_default()
    }
}

/// Reporter whose log lines are fed by the test
pub struct FeedReporter {
    id: String,
    metrics: Vec<Metric>,
    feed: Mutex<Option<mpsc::UnboundedReceiver<LogLine>>>,
}

impl FeedReporter {
    pub fn new(id: &str) -> (Arc<Self>, mpsc::UnboundedSender<LogLine>) {
        let (tx, rx) = mpsc::unbounded();
        let reporter = Arc::new(Self {
            id: id.to_string(),
            metrics: vec![Metric::uncountable("installed", "Installed packages", "", 42)],
            feed: Mutex::new(Some(rx)),
        });
        (reporter, tx)
    }
}

#[async_trait]
impl Reporter for FeedReporter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn issues(&self) -> Result<Vec<Issue>, ReporterError> {
        Ok(Vec::new())
    }

    async fn metrics(&self) -> Result<Vec<Metric>, ReporterError> {
        Ok(self.metrics.clone())
    }

    async fn hosts(&self) -> Result<Vec<Arc<dyn Host>>, ReporterError> {
        Ok(Vec::new())
    }

    fn take_log_lines(&self) -> Option<LogLineStream> {
        self.feed.lock().unwrap().take().map(StreamExt::boxed)
    }
}

pub fn log_line(reporter: &str, n: usize) -> LogLine {
    LogLine {
        host_id: "local".to_string(),
        host_name: "box".to_string(),
        reporter_id: reporter.to_string(),
        line: format!("{reporter} line {n}"),
        tags: vec![format!("seq-{n}")],
        timestamp: Utc::now(),
    }
}

/// Let spawned tasks make progress without advancing time
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}
