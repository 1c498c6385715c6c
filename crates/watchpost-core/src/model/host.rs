//! Hosts and ancestor chains

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::HostError;
use crate::model::reporter::Reporter;

/// Upper bound on the ancestor walk
pub const MAX_ANCESTRY_DEPTH: usize = 64;

/// A monitored machine or logical node
///
/// A host does not own children. Sub-hosts are discovered only through
/// reporters, which own them.
pub trait Host: Send + Sync {
    /// Stable identifier, used as tie-break and logging key
    fn id(&self) -> &str;

    /// Whether this is the machine the agent runs on
    fn is_local(&self) -> bool;

    /// Human-readable name, resolved lazily
    ///
    /// # Errors
    /// Returns `HostError::NameUnavailable` if the name cannot be resolved.
    fn human_name(&self) -> Result<String, HostError>;

    /// Parent host, if any
    fn parent(&self) -> Option<Arc<dyn Host>>;

    /// Reporters currently active for this host
    fn reporters(&self) -> Vec<Arc<dyn Reporter>>;
}

impl fmt::Debug for dyn Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("id", &self.id())
            .field("is_local", &self.is_local())
            .finish_non_exhaustive()
    }
}

/// Walk the parent chain, closest ancestor first
///
/// Stops at the root, at the first repeated host id, or after
/// `MAX_ANCESTRY_DEPTH` steps, whichever comes first.
pub fn ancestors(host: &dyn Host) -> Vec<Arc<dyn Host>> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(host.id().to_string());

    let mut chain = Vec::new();
    let mut next = host.parent();

    while let Some(parent) = next {
        if chain.len() >= MAX_ANCESTRY_DEPTH {
            warn!(host = %host.id(), depth = MAX_ANCESTRY_DEPTH, "ancestor chain too deep, truncating");
            break;
        }
        if !seen.insert(parent.id().to_string()) {
            warn!(host = %host.id(), repeated = %parent.id(), "ancestor cycle detected, truncating");
            break;
        }
        next = parent.parent();
        chain.push(parent);
    }

    chain
}

/// A host with a fixed name and no reporters of its own
///
/// Reporters use this to describe the sub-hosts they discover.
#[derive(Clone)]
pub struct ChildHost {
    id: String,
    human_name: String,
    parent: Option<Arc<dyn Host>>,
}

impl ChildHost {
    /// Create a host under `parent`
    pub fn new(
        id: impl Into<String>,
        human_name: impl Into<String>,
        parent: Option<Arc<dyn Host>>,
    ) -> Self {
        Self {
            id: id.into(),
            human_name: human_name.into(),
            parent,
        }
    }
}

impl Host for ChildHost {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_local(&self) -> bool {
        false
    }

    fn human_name(&self) -> Result<String, HostError> {
        Ok(self.human_name.clone())
    }

    fn parent(&self) -> Option<Arc<dyn Host>> {
        self.parent.clone()
    }

    fn reporters(&self) -> Vec<Arc<dyn Reporter>> {
        Vec::new()
    }
}
