//! Package inventory reporter
//!
//! Reports how many packages have pending updates, how many are installed,
//! and which repositories are enabled. Backed by apt on Debian-likes and
//! dnf (or yum) on Fedora-likes.

pub mod apt;
pub mod dnf;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use watchpost_core::{
    Host, Issue, Metric, PluginError, Reporter, ReporterError, ReporterFactory, Thresholds,
};

use crate::error::PackageError;
use crate::exec::{CommandRunner, LocalRunner};

pub use apt::AptBackend;
pub use dnf::DnfBackend;

/// Reporter and factory id
pub const PACKAGES_ID: &str = "packages";

/// Pending updates at or above this count are a warning
pub const UPDATES_WARNING_LEVEL: i64 = 1;
/// Pending updates at or above this count are a danger
pub const UPDATES_DANGER_LEVEL: i64 = 21;

/// Queries one package manager
#[async_trait]
pub trait PackageBackend: Send + Sync {
    /// Package manager name, for logging
    fn name(&self) -> &'static str;

    /// Whether the package manager is installed
    async fn is_available(&self) -> bool;

    /// Packages with an update available in enabled repositories
    async fn count_upgradable(&self) -> Result<u64, PackageError>;

    /// Installed packages
    async fn count_installed(&self) -> Result<u64, PackageError>;

    /// Names of the enabled repositories
    async fn enabled_repositories(&self) -> Result<Vec<String>, PackageError>;
}

/// Package inventory for the local host
pub struct PackagesReporter {
    backend: Arc<dyn PackageBackend>,
}

impl PackagesReporter {
    #[must_use]
    pub fn new(backend: Arc<dyn PackageBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Reporter for PackagesReporter {
    fn id(&self) -> &str {
        PACKAGES_ID
    }

    async fn issues(&self) -> Result<Vec<Issue>, ReporterError> {
        Ok(Vec::new())
    }

    /// Metrics whose query fails are left out of the snapshot
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    async fn metrics(&self) -> Result<Vec<Metric>, ReporterError> {
        let mut metrics = Vec::with_capacity(3);

        match self.backend.count_upgradable().await {
            Ok(count) => metrics.push(Metric::with_thresholds(
                "needupdate",
                "Packages requiring updates",
                "The number of packages for which updates are available in the configured enabled software repositories.",
                saturate(count),
                Thresholds::new(UPDATES_WARNING_LEVEL, UPDATES_DANGER_LEVEL),
            )),
            Err(e) => warn!(metric = "needupdate", error = %e, "metric unavailable"),
        }

        match self.backend.count_installed().await {
            Ok(count) => metrics.push(Metric::uncountable(
                "installed",
                "Installed packages",
                "The number of packages installed on the system.",
                saturate(count),
            )),
            Err(e) => warn!(metric = "installed", error = %e, "metric unavailable"),
        }

        match self.backend.enabled_repositories().await {
            Ok(repos) => metrics.push(Metric::string_array(
                "repolist",
                "Package repository list",
                "A list of package repositories currently enabled on this host",
                repos,
            )),
            Err(e) => warn!(metric = "repolist", error = %e, "metric unavailable"),
        }

        debug!(count = metrics.len(), "collected package metrics");
        Ok(metrics)
    }

    async fn hosts(&self) -> Result<Vec<Arc<dyn Host>>, ReporterError> {
        Ok(Vec::new())
    }
}

fn saturate(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Creates a `PackagesReporter` for local hosts with a known package manager
pub struct PackagesFactory {
    backends: Vec<Arc<dyn PackageBackend>>,
}

impl PackagesFactory {
    /// apt first, then dnf/yum, all run locally
    #[must_use]
    pub fn new() -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(LocalRunner::new());
        Self::with_backends(vec![
            Arc::new(AptBackend::new(runner.clone())),
            Arc::new(DnfBackend::new(runner)),
        ])
    }

    /// Probe `backends` in order
    #[must_use]
    pub fn with_backends(backends: Vec<Arc<dyn PackageBackend>>) -> Self {
        Self { backends }
    }

    async fn detect(&self) -> Option<Arc<dyn PackageBackend>> {
        for backend in &self.backends {
            if backend.is_available().await {
                return Some(backend.clone());
            }
        }
        None
    }
}

impl Default for PackagesFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReporterFactory for PackagesFactory {
    fn id(&self) -> &str {
        PACKAGES_ID
    }

    async fn applicable_to(&self, host: &Arc<dyn Host>) -> Result<bool, PluginError> {
        if !host.is_local() {
            return Ok(false);
        }
        Ok(self.detect().await.is_some())
    }

    async fn create(&self, _host: &Arc<dyn Host>) -> Result<Arc<dyn Reporter>, PluginError> {
        let backend = self.detect().await.ok_or_else(|| {
            PackageError::ManagerNotFound("neither apt nor dnf/yum found".to_string())
        })?;
        info!(backend = backend.name(), "using package manager");
        Ok(Arc::new(PackagesReporter::new(backend)))
    }
}
