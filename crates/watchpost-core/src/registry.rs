//! Reporter registry
//!
//! Built once at process start and handed to whatever assembles hosts.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::model::{Host, Reporter, ReporterFactory};

/// Ordered list of reporter factories
#[derive(Default)]
pub struct ReporterRegistry {
    factories: Vec<Arc<dyn ReporterFactory>>,
}

impl ReporterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory
    pub fn register(&mut self, factory: Arc<dyn ReporterFactory>) {
        info!(factory = %factory.id(), "registered reporter factory");
        self.factories.push(factory);
    }

    /// Builder-style `register`
    #[must_use]
    pub fn with(mut self, factory: Arc<dyn ReporterFactory>) -> Self {
        self.register(factory);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Factory ids in registration order
    #[must_use]
    pub fn factory_ids(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.id()).collect()
    }

    /// Instantiate every applicable reporter for `host`
    ///
    /// Best effort: a factory whose predicate errors or says no is skipped,
    /// and so is one whose constructor fails. Survivors come back in
    /// registration order.
    pub async fn generate_for(&self, host: &Arc<dyn Host>) -> Vec<Arc<dyn Reporter>> {
        let mut reporters = Vec::with_capacity(self.factories.len());

        for factory in &self.factories {
            match factory.applicable_to(host).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(factory = %factory.id(), host = %host.id(), "not applicable");
                    continue;
                }
                Err(e) => {
                    warn!(factory = %factory.id(), host = %host.id(), error = %e, "not applicable");
                    continue;
                }
            }

            info!(factory = %factory.id(), host = %host.id(), "applicable");

            match factory.create(host).await {
                Ok(reporter) => reporters.push(reporter),
                Err(e) => {
                    warn!(factory = %factory.id(), host = %host.id(), error = %e, "error instantiating reporter");
                }
            }
        }

        reporters
    }
}

impl fmt::Debug for ReporterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterRegistry")
            .field("factories", &self.factory_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{PluginError, ReporterError};
    use crate::model::{ChildHost, Issue, Metric};

    struct NamedReporter(String);

    #[async_trait]
    impl Reporter for NamedReporter {
        fn id(&self) -> &str {
            &self.0
        }
        async fn issues(&self) -> Result<Vec<Issue>, ReporterError> {
            Ok(Vec::new())
        }
        async fn metrics(&self) -> Result<Vec<Metric>, ReporterError> {
            Ok(Vec::new())
        }
        async fn hosts(&self) -> Result<Vec<Arc<dyn Host>>, ReporterError> {
            Ok(Vec::new())
        }
    }

    enum Behaviour {
        Ok,
        NotApplicable,
        PredicateFails,
        ConstructionFails,
    }

    struct TestFactory {
        id: &'static str,
        behaviour: Behaviour,
        created: AtomicUsize,
    }

    impl TestFactory {
        fn new(id: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                id,
                behaviour,
                created: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReporterFactory for TestFactory {
        fn id(&self) -> &str {
            self.id
        }

        async fn applicable_to(&self, _host: &Arc<dyn Host>) -> Result<bool, PluginError> {
            match self.behaviour {
                Behaviour::NotApplicable => Ok(false),
                Behaviour::PredicateFails => {
                    Err(PluginError::Applicability("transport unavailable".into()))
                }
                Behaviour::Ok | Behaviour::ConstructionFails => Ok(true),
            }
        }

        async fn create(&self, _host: &Arc<dyn Host>) -> Result<Arc<dyn Reporter>, PluginError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::ConstructionFails => {
                    Err(PluginError::Construction("socket bind failed".into()))
                }
                _ => Ok(Arc::new(NamedReporter(self.id.to_string()))),
            }
        }
    }

    fn host() -> Arc<dyn Host> {
        Arc::new(ChildHost::new("local", "box", None))
    }

    fn ids(reporters: &[Arc<dyn Reporter>]) -> Vec<&str> {
        reporters.iter().map(|r| r.id()).collect()
    }

    #[tokio::test]
    async fn test_failing_predicate_is_skipped() {
        let registry = ReporterRegistry::new()
            .with(TestFactory::new("a", Behaviour::Ok))
            .with(TestFactory::new("b", Behaviour::PredicateFails))
            .with(TestFactory::new("c", Behaviour::Ok));

        let reporters = registry.generate_for(&host()).await;

        assert_eq!(ids(&reporters), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_create_not_called_when_not_applicable() {
        let declines = TestFactory::new("declines", Behaviour::NotApplicable);
        let errors = TestFactory::new("errors", Behaviour::PredicateFails);
        let registry = ReporterRegistry::new()
            .with(declines.clone())
            .with(errors.clone());

        let reporters = registry.generate_for(&host()).await;

        assert!(reporters.is_empty());
        assert_eq!(declines.created.load(Ordering::SeqCst), 0);
        assert_eq!(errors.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_construction_failure_is_isolated() {
        let registry = ReporterRegistry::new()
            .with(TestFactory::new("broken", Behaviour::ConstructionFails))
            .with(TestFactory::new("working", Behaviour::Ok));

        let reporters = registry.generate_for(&host()).await;

        assert_eq!(ids(&reporters), vec!["working"]);
    }

    #[tokio::test]
    async fn test_registration_order_is_kept() {
        let registry = ReporterRegistry::new()
            .with(TestFactory::new("z", Behaviour::Ok))
            .with(TestFactory::new("m", Behaviour::Ok))
            .with(TestFactory::new("a", Behaviour::Ok));

        assert_eq!(registry.factory_ids(), vec!["z", "m", "a"]);
        assert_eq!(ids(&registry.generate_for(&host()).await), vec!["z", "m", "a"]);
    }
}
