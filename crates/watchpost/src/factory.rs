//! Reporter registry and local host assembly

use std::sync::Arc;

use tracing::info;
use watchpost_core::{Host, ReporterRegistry};
use watchpost_reporters::{LocalHost, PackagesFactory, SyslogFactory};

/// Registry with every bundled reporter factory
#[must_use]
pub fn build_registry() -> ReporterRegistry {
    ReporterRegistry::new()
        .with(Arc::new(PackagesFactory::new()))
        .with(Arc::new(SyslogFactory::new()))
}

/// The local host with the reporters `registry` produces for it attached
pub async fn local_host(registry: &ReporterRegistry) -> Arc<LocalHost> {
    let host = LocalHost::new();
    let as_host: Arc<dyn Host> = host.clone();

    let reporters = registry.generate_for(&as_host).await;
    info!(
        host = %as_host.id(),
        reporters = reporters.len(),
        "reporters ready"
    );
    host.attach(reporters);
    host
}
